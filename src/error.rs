// error.rs: viewer error taxonomy

use std::time::Duration;

/// Failures while fetching or decoding a carpet image.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("invalid image url: {0}")]
    InvalidUrl(String),
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("server answered with HTTP {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image load timed out after {0:?}")]
    TimedOut(Duration),
    #[error("image load cancelled")]
    Cancelled,
}

impl From<ureq::Error> for TextureError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => TextureError::Http { status },
            ureq::Error::Transport(t) => TextureError::Transport(t.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("rendering context unavailable: {0}")]
    Context(String),
    #[error("failed to load texture {url}: {source}")]
    Texture {
        url: String,
        #[source]
        source: TextureError,
    },
    #[error("render failed: {0}")]
    Render(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("carpet size must be positive, got {width} x {height} cm")]
    InvalidSize { width: f32, height: f32 },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_error_wraps_into_viewer_error() {
        let err = ViewerError::Texture {
            url: "missing.png".into(),
            source: TextureError::Http { status: 404 },
        };
        let text = err.to_string();
        assert!(text.contains("missing.png"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
