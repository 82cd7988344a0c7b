// config.rs: carpet/viewer options and CLI/env/file resolution
//
// Precedence: CLI flags > CARPET_VIEWER_* env vars > --config <file.json> > defaults.

use crate::error::ConfigError;
use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Centimeters per scene unit. One scene unit is one meter.
pub const CM_PER_UNIT: f32 = 100.0;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeCm {
    pub width: f32,
    pub height: f32,
}

impl SizeCm {
    pub fn new(width: f32, height: f32) -> Result<Self, ConfigError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(ConfigError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn to_scene_units(&self) -> (f32, f32) {
        (self.width / CM_PER_UNIT, self.height / CM_PER_UNIT)
    }
}

/// A carpet image together with its physical size.
#[derive(Debug, Clone, PartialEq)]
pub struct CarpetSpec {
    pub image_url: String,
    pub size_cm: SizeCm,
}

impl CarpetSpec {
    pub fn new(image_url: impl Into<String>, size_cm: SizeCm) -> Self {
        Self {
            image_url: image_url.into(),
            size_cm,
        }
    }

    /// Width (X) and depth (Z) of the carpet plane in scene units.
    pub fn scene_size(&self) -> (f32, f32) {
        self.size_cm.to_scene_units()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Furnished living room.
    #[default]
    Room,
    /// Shadow-catcher floor, product-shot style.
    Studio,
}

/// Optional image files replacing the procedural room materials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureOverrides {
    pub wood: Option<String>,
    pub wall: Option<String>,
    pub fabric: Option<String>,
    pub sky: Option<String>,
}

/// Everything one viewer session needs.
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub name: String,
    pub carpet: Option<CarpetSpec>,
    pub mode: ViewMode,
    pub auto_rotate: bool,
    pub show_controls: bool,
    /// 2D image shown when the 3D texture cannot be loaded.
    pub fallback_image: Option<String>,
    pub textures: TextureOverrides,
    pub load_timeout: Duration,
}

impl ViewerOptions {
    pub fn new(image_url: impl Into<String>, name: impl Into<String>, size_cm: SizeCm) -> Self {
        Self {
            name: name.into(),
            carpet: Some(CarpetSpec::new(image_url, size_cm)),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ViewMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            carpet: None,
            mode: ViewMode::Room,
            auto_rotate: false,
            show_controls: true,
            fallback_image: None,
            textures: TextureOverrides::default(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// Command line. Flags override `CARPET_VIEWER_*` variables, which override
/// the `--config` file.
#[derive(Debug, Default, Parser)]
#[command(
    name = "carpet-viewer",
    version,
    about = "Preview a carpet image at its real size in a 3D room or studio"
)]
pub struct Cli {
    /// JSON file with defaults for every option below.
    #[arg(long, env = "CARPET_VIEWER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Carpet image: local path, file:// or http(s):// URL.
    #[arg(long, env = "CARPET_VIEWER_IMAGE", value_name = "URL")]
    pub image: Option<String>,

    #[arg(long, env = "CARPET_VIEWER_NAME")]
    pub name: Option<String>,

    /// Carpet width in centimeters.
    #[arg(long, value_name = "CM")]
    pub width_cm: Option<f32>,

    /// Carpet length in centimeters.
    #[arg(long, value_name = "CM")]
    pub height_cm: Option<f32>,

    #[arg(long, env = "CARPET_VIEWER_MODE", value_enum)]
    pub mode: Option<ViewMode>,

    /// Slowly orbit the carpet while idle.
    #[arg(long, env = "CARPET_VIEWER_AUTO_ROTATE", value_parser = BoolishValueParser::new())]
    pub auto_rotate: bool,

    /// Hide the menu bar and zoom buttons.
    #[arg(long)]
    pub no_controls: bool,

    /// 2D image shown when the 3D view cannot be built.
    #[arg(long, value_name = "URL")]
    pub fallback: Option<String>,

    /// UI language: en, zh-Hans or fr.
    #[arg(long, env = "CARPET_VIEWER_LANG")]
    pub lang: Option<String>,

    /// Give up on the carpet image after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub image: Option<String>,
    pub name: String,
    pub width_cm: f32,
    pub height_cm: f32,
    pub mode: ViewMode,
    pub auto_rotate: bool,
    pub show_controls: bool,
    pub fallback: Option<String>,
    pub lang: String,
    pub timeout_secs: u64,
    pub textures: TextureOverrides,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image: None,
            name: "Carpet".to_string(),
            width_cm: 200.0,
            height_cm: 300.0,
            mode: ViewMode::Room,
            auto_rotate: false,
            show_controls: true,
            fallback: None,
            lang: "en".to_string(),
            timeout_secs: DEFAULT_LOAD_TIMEOUT.as_secs(),
            textures: TextureOverrides::default(),
        }
    }
}

impl AppConfig {
    /// Resolve from the process arguments and environment. Exits with usage
    /// text on malformed flags or `--help`.
    pub fn from_env_and_args() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mut cfg = match &cli.config {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        cfg.apply(cli);
        Ok(cfg)
    }

    fn apply(&mut self, cli: Cli) {
        if let Some(image) = cli.image {
            self.image = Some(image);
        }
        if let Some(name) = cli.name {
            self.name = name;
        }
        if let Some(width) = cli.width_cm {
            self.width_cm = width;
        }
        if let Some(height) = cli.height_cm {
            self.height_cm = height;
        }
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
        if cli.auto_rotate {
            self.auto_rotate = true;
        }
        if cli.no_controls {
            self.show_controls = false;
        }
        if let Some(fallback) = cli.fallback {
            self.fallback = Some(fallback);
        }
        if let Some(lang) = cli.lang {
            self.lang = lang;
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = secs;
        }
    }

    pub fn viewer_options(&self) -> Result<ViewerOptions, ConfigError> {
        let carpet = match &self.image {
            Some(url) => Some(CarpetSpec::new(
                url.clone(),
                SizeCm::new(self.width_cm, self.height_cm)?,
            )),
            None => None,
        };
        Ok(ViewerOptions {
            name: self.name.clone(),
            carpet,
            mode: self.mode,
            auto_rotate: self.auto_rotate,
            show_controls: self.show_controls,
            fallback_image: self.fallback.clone(),
            textures: self.textures.clone(),
            load_timeout: Duration::from_secs(self.timeout_secs.max(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("carpet-viewer").chain(args.iter().copied()))
    }

    fn temp_config(tag: &str, json: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "carpet-viewer-{tag}-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn size_converts_centimeters_to_scene_units() {
        let size = SizeCm::new(200.0, 300.0).unwrap();
        assert_eq!(size.to_scene_units(), (2.0, 3.0));
    }

    #[test]
    fn size_rejects_non_positive_values() {
        assert!(SizeCm::new(0.0, 100.0).is_err());
        assert!(SizeCm::new(100.0, -1.0).is_err());
        assert!(SizeCm::new(f32::NAN, 100.0).is_err());
    }

    #[test]
    fn command_line_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_gives_defaults() {
        let cfg = AppConfig::from_cli(parse(&[]).unwrap()).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn flags_override_the_config_file() {
        let path = temp_config(
            "override",
            r#"{ "mode": "studio", "lang": "fr", "width_cm": 90, "name": "Kilim" }"#,
        );
        let path_arg = path.display().to_string();
        let cli = parse(&[
            "--config",
            &path_arg,
            "--mode",
            "room",
            "--image",
            "rug.png",
            "--width-cm",
            "160",
            "--auto-rotate",
            "--no-controls",
        ])
        .unwrap();
        let cfg = AppConfig::from_cli(cli).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.mode, ViewMode::Room);
        assert_eq!(cfg.lang, "fr");
        assert_eq!(cfg.name, "Kilim");
        assert_eq!(cfg.image.as_deref(), Some("rug.png"));
        assert_eq!(cfg.width_cm, 160.0);
        assert!(cfg.auto_rotate);
        assert!(!cfg.show_controls);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse(&["--width-cm", "wide"]).is_err());
        assert!(parse(&["--mode", "garden"]).is_err());
        assert!(parse(&["--timeout-secs", "-3"]).is_err());
        assert_eq!(parse(&["--mode", "studio"]).unwrap().mode, Some(ViewMode::Studio));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let cli = parse(&["--config", "/no/such/carpet-viewer.json"]).unwrap();
        let err = AppConfig::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn viewer_options_validate_size() {
        let cfg = AppConfig {
            image: Some("rug.png".into()),
            width_cm: -5.0,
            ..AppConfig::default()
        };
        assert!(cfg.viewer_options().is_err());

        let no_image = AppConfig::default().viewer_options().unwrap();
        assert!(no_image.carpet.is_none());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{ "mode": "studio", "width_cm": 120 }"#).unwrap();
        assert_eq!(cfg.mode, ViewMode::Studio);
        assert_eq!(cfg.width_cm, 120.0);
        assert_eq!(cfg.height_cm, 300.0);
        assert!(cfg.show_controls);
    }
}
