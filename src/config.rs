use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::motion::ClassifierConfig;
use crate::session::SessionConfig;

const DEFAULT_NIGHT_MODE: bool = true;
const DEFAULT_RECORD_SECONDS: u32 = 10;
const DEFAULT_OUTPUT_PATH: &str = "capture.h264";
const DEFAULT_RESOLUTION: Resolution = Resolution::new(800, 600);
const DEFAULT_FRAMERATE: u32 = 15;
const DEFAULT_SENSITIVITY: u32 = 60;
const DEFAULT_DIFFERENCE_PERCENTAGE: u32 = 30;
const DEFAULT_KEY_FRAME_INTERVAL: u32 = 30;

/// Capture resolution, written as `WIDTHxHEIGHT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("resolution must look like WIDTHxHEIGHT, got {:?}", s))?;
        let width: u32 = width
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid resolution width in {:?}", s))?;
        let height: u32 = height
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid resolution height in {:?}", s))?;
        if width == 0 || height == 0 {
            bail!("resolution must be non-zero, got {:?}", s);
        }
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RecorderConfigFile {
    night_mode: Option<bool>,
    minimum_record_seconds: Option<u32>,
    output_path: Option<PathBuf>,
    resolution: Option<String>,
    framerate: Option<u32>,
    key_frame_interval: Option<u32>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    sensitivity: Option<u32>,
    difference_percentage: Option<u32>,
}

/// Command-line values, applied on top of file and environment settings.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub night_mode: Option<bool>,
    pub minimum_record_seconds: Option<u32>,
    pub output_path: Option<PathBuf>,
    pub resolution: Option<String>,
    pub framerate: Option<u32>,
    pub sensitivity: Option<u32>,
    pub difference_percentage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub night_mode: bool,
    pub minimum_record_seconds: u32,
    pub output_path: PathBuf,
    pub resolution: Resolution,
    pub framerate: u32,
    pub key_frame_interval: u32,
    pub sensitivity: u32,
    pub difference_percentage: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            night_mode: DEFAULT_NIGHT_MODE,
            minimum_record_seconds: DEFAULT_RECORD_SECONDS,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            resolution: DEFAULT_RESOLUTION,
            framerate: DEFAULT_FRAMERATE,
            key_frame_interval: DEFAULT_KEY_FRAME_INTERVAL,
            sensitivity: DEFAULT_SENSITIVITY,
            difference_percentage: DEFAULT_DIFFERENCE_PERCENTAGE,
        }
    }
}

impl RecorderConfig {
    /// Defaults, then the config file, then environment.
    pub fn load() -> Result<Self> {
        Self::load_with(&ConfigOverrides::default())
    }

    /// Like [`load`](Self::load), with command-line overrides applied last.
    pub fn load_with(overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = overrides.config_path.clone().or_else(|| {
            std::env::var("MOTION_RECORDER_CONFIG")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        });
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => RecorderConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.apply_overrides(overrides)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RecorderConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let resolution = match file.resolution {
            Some(raw) => raw.parse()?,
            None => defaults.resolution,
        };
        let detection = file.detection.unwrap_or_default();
        Ok(Self {
            night_mode: file.night_mode.unwrap_or(defaults.night_mode),
            minimum_record_seconds: file
                .minimum_record_seconds
                .unwrap_or(defaults.minimum_record_seconds),
            output_path: file.output_path.unwrap_or(defaults.output_path),
            resolution,
            framerate: file.framerate.unwrap_or(defaults.framerate),
            key_frame_interval: file
                .key_frame_interval
                .unwrap_or(defaults.key_frame_interval),
            sensitivity: detection.sensitivity.unwrap_or(defaults.sensitivity),
            difference_percentage: detection
                .difference_percentage
                .unwrap_or(defaults.difference_percentage),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_value("MOTION_RECORDER_OUTPUT") {
            self.output_path = PathBuf::from(path);
        }
        if let Some(resolution) = env_value("MOTION_RECORDER_RESOLUTION") {
            self.resolution = resolution.parse()?;
        }
        if let Some(seconds) = env_value("MOTION_RECORDER_RECORD_SECONDS") {
            self.minimum_record_seconds = parse_env("MOTION_RECORDER_RECORD_SECONDS", &seconds)?;
        }
        if let Some(fps) = env_value("MOTION_RECORDER_FRAMERATE") {
            self.framerate = parse_env("MOTION_RECORDER_FRAMERATE", &fps)?;
        }
        if let Some(sensitivity) = env_value("MOTION_RECORDER_SENSITIVITY") {
            self.sensitivity = parse_env("MOTION_RECORDER_SENSITIVITY", &sensitivity)?;
        }
        if let Some(percentage) = env_value("MOTION_RECORDER_DIFFERENCE_PERCENTAGE") {
            self.difference_percentage =
                parse_env("MOTION_RECORDER_DIFFERENCE_PERCENTAGE", &percentage)?;
        }
        if let Some(night) = env_value("MOTION_RECORDER_NIGHT") {
            self.night_mode = parse_bool("MOTION_RECORDER_NIGHT", &night)?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(night_mode) = overrides.night_mode {
            self.night_mode = night_mode;
        }
        if let Some(seconds) = overrides.minimum_record_seconds {
            self.minimum_record_seconds = seconds;
        }
        if let Some(path) = &overrides.output_path {
            self.output_path = path.clone();
        }
        if let Some(resolution) = &overrides.resolution {
            self.resolution = resolution.parse()?;
        }
        if let Some(fps) = overrides.framerate {
            self.framerate = fps;
        }
        if let Some(sensitivity) = overrides.sensitivity {
            self.sensitivity = sensitivity;
        }
        if let Some(percentage) = overrides.difference_percentage {
            self.difference_percentage = percentage;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.minimum_record_seconds == 0 {
            bail!("minimum_record_seconds must be greater than zero");
        }
        if self.framerate == 0 {
            bail!("framerate must be greater than zero");
        }
        if self.key_frame_interval == 0 {
            bail!("key_frame_interval must be greater than zero");
        }
        if self.difference_percentage > 100 {
            bail!(
                "difference_percentage must be between 0 and 100, got {}",
                self.difference_percentage
            );
        }
        if self.output_path.as_os_str().is_empty() {
            bail!("output_path must not be empty");
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            bail!("resolution must be non-zero");
        }
        Ok(())
    }

    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            sensitivity: self.sensitivity,
            difference_percentage: self.difference_percentage,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            minimum_record_seconds: self.minimum_record_seconds,
            output_path: self.output_path.clone(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<RecorderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a non-negative integer, got {:?}", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be a boolean, got {:?}", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolution() {
        assert_eq!("800x600".parse::<Resolution>().unwrap(), Resolution::new(800, 600));
        assert_eq!(" 1920X1080 ".parse::<Resolution>().unwrap(), Resolution::new(1920, 1080));
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn rejects_bad_resolution() {
        for raw in ["800", "800x", "x600", "0x600", "800x0", "800*600", "-800x600", "axb"] {
            assert!(raw.parse::<Resolution>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = RecorderConfig::default();
        cfg.validate().unwrap();
        assert!(cfg.night_mode);
        assert_eq!(cfg.output_path, PathBuf::from("capture.h264"));
        assert_eq!(cfg.classifier(), ClassifierConfig::default());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut cfg = RecorderConfig {
            difference_percentage: 101,
            ..RecorderConfig::default()
        };
        assert!(cfg.validate().is_err());

        cfg.difference_percentage = 100;
        cfg.minimum_record_seconds = 0;
        assert!(cfg.validate().is_err());

        cfg.minimum_record_seconds = 1;
        cfg.output_path = PathBuf::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("K", "Yes").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }
}
