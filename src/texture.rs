// texture.rs: background image fetching for carpet and material textures
//
// A worker thread fetches + decodes, then reports through an mpsc channel that the
// viewer drains once per frame. There is no way to abort a blocking read, so
// cancellation only guarantees the result is dropped instead of delivered.

use crate::error::TextureError;
use image::io::Reader as ImageReader;
use image::RgbaImage;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    /// Fraction in `[0, 1]`.
    Progress(f32),
    Loaded(RgbaImage),
    Failed(TextureError),
}

/// Where image bytes come from. Implementations run on a worker thread.
pub trait ImageFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        progress: &mut dyn FnMut(f32),
        cancel: &CancelToken,
    ) -> Result<RgbaImage, TextureError>;
}

/// Local paths, `file://` URLs and `http(s)://` URLs.
pub struct UrlFetcher {
    agent: ureq::Agent,
}

impl UrlFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout.min(Duration::from_secs(10)))
                .timeout(timeout)
                .build(),
        }
    }

    fn fetch_http(
        &self,
        url: &str,
        progress: &mut dyn FnMut(f32),
        cancel: &CancelToken,
    ) -> Result<RgbaImage, TextureError> {
        let response = self.agent.get(url).call()?;
        let total = response
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok());

        let mut reader = response.into_reader();
        let mut bytes = Vec::with_capacity(total.unwrap_or(READ_CHUNK));
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if cancel.is_cancelled() {
                return Err(TextureError::Cancelled);
            }
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if let Some(total) = total.filter(|t| *t > 0) {
                progress((bytes.len() as f32 / total as f32).min(1.0));
            }
        }
        decode_bytes(&bytes)
    }
}

impl Default for UrlFetcher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOAD_TIMEOUT)
    }
}

impl ImageFetcher for UrlFetcher {
    fn fetch(
        &self,
        url: &str,
        progress: &mut dyn FnMut(f32),
        cancel: &CancelToken,
    ) -> Result<RgbaImage, TextureError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(TextureError::InvalidUrl(url.to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return self.fetch_http(trimmed, progress, cancel);
        }
        let path = local_path(trimmed)?;
        progress(0.0);
        let img = load_image_file(&path)?;
        progress(1.0);
        Ok(img)
    }
}

fn local_path(url: &str) -> Result<PathBuf, TextureError> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") {
        return Err(TextureError::InvalidUrl(url.to_string()));
    }
    Ok(PathBuf::from(url))
}

/// Synchronous decode of an image file with the format guessed from its content.
pub fn load_image_file(path: &Path) -> Result<RgbaImage, TextureError> {
    let file = std::fs::File::open(path)?;
    let mut reader = ImageReader::new(BufReader::new(file)).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?.to_rgba8())
}

fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage, TextureError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?.to_rgba8())
}

/// Receiving end of one in-flight fetch.
pub struct LoadHandle {
    url: String,
    receiver: Receiver<LoadEvent>,
    cancel: CancelToken,
    started: Instant,
    timeout: Duration,
    finished: bool,
}

impl LoadHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns pending events without blocking. A fetch that outlives its timeout
    /// is cancelled and reported as `TimedOut`.
    pub fn drain(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let terminal = !matches!(event, LoadEvent::Progress(_));
                    events.push(event);
                    if terminal {
                        self.finished = true;
                        return events;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.finished = true;
                    events.push(LoadEvent::Failed(TextureError::Cancelled));
                    return events;
                }
            }
        }
        if self.started.elapsed() >= self.timeout {
            log::warn!("texture fetch for {} exceeded {:?}", self.url, self.timeout);
            self.cancel.cancel();
            self.finished = true;
            events.push(LoadEvent::Failed(TextureError::TimedOut(self.timeout)));
        }
        events
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct TextureLoader {
    fetcher: Arc<dyn ImageFetcher>,
    timeout: Duration,
}

impl TextureLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    pub fn spawn(&self, url: &str) -> LoadHandle {
        let (tx, rx) = channel();
        let cancel = CancelToken::default();
        let worker_cancel = cancel.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let worker_url = url.to_string();

        log::info!("loading texture in background: {url}");
        thread::spawn(move || {
            let progress_tx = tx.clone();
            let progress_cancel = worker_cancel.clone();
            let mut progress = move |fraction: f32| {
                if !progress_cancel.is_cancelled() {
                    let _ = progress_tx.send(LoadEvent::Progress(fraction.clamp(0.0, 1.0)));
                }
            };

            let result = fetcher.fetch(&worker_url, &mut progress, &worker_cancel);
            if worker_cancel.is_cancelled() {
                log::debug!("dropping result for cancelled fetch {worker_url}");
                return;
            }
            let event = match result {
                Ok(img) => {
                    let (w, h) = img.dimensions();
                    log::info!("texture loaded: {worker_url} ({w}x{h})");
                    LoadEvent::Loaded(img)
                }
                Err(err) => {
                    log::warn!("texture failed: {worker_url}: {err}");
                    LoadEvent::Failed(err)
                }
            };
            // the viewer may already be gone
            let _ = tx.send(event);
        });

        LoadHandle {
            url: url.to_string(),
            receiver: rx,
            cancel,
            started: Instant::now(),
            timeout: self.timeout,
            finished: false,
        }
    }
}
