use faceframe_core::capture::{
    CaptureSettings, DEFAULT_BRIGHTNESS_PERCENT, MAX_BRIGHTNESS_PERCENT, MIN_BRIGHTNESS_PERCENT,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session configuration: optional TOML file, then `FACEFRAME_*` environment
/// variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Face-mesh ONNX model file.
    pub model_path: PathBuf,
    /// SCRFD face detector ONNX model file.
    pub detector_path: PathBuf,
    /// Requested capture width in pixels.
    pub width: u32,
    /// Requested capture height in pixels.
    pub height: u32,
    /// Show and capture the image mirrored, like a selfie preview.
    pub mirrored: bool,
    /// Draw the face-outline overlay on previews.
    pub show_overlay: bool,
    /// Capture brightness in percent (50–200).
    pub brightness: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_path: default_data_dir().join("models/face_mesh.onnx"),
            detector_path: default_data_dir().join("models/det_10g.onnx"),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            mirrored: true,
            show_overlay: true,
            brightness: DEFAULT_BRIGHTNESS_PERCENT,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "reading config file");
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.normalize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEFRAME_*` overrides fetched through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEFRAME_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("FACEFRAME_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEFRAME_DETECTOR_PATH") {
            self.detector_path = PathBuf::from(v);
        }
        override_parsed(&lookup, "FACEFRAME_WIDTH", &mut self.width);
        override_parsed(&lookup, "FACEFRAME_HEIGHT", &mut self.height);
        override_parsed(&lookup, "FACEFRAME_BRIGHTNESS", &mut self.brightness);
        if let Some(v) = lookup("FACEFRAME_MIRRORED") {
            self.mirrored = v != "0";
        }
        if let Some(v) = lookup("FACEFRAME_SHOW_OVERLAY") {
            self.show_overlay = v != "0";
        }
    }

    /// Pull out-of-range values back into range, warning about each one.
    pub fn normalize(&mut self) {
        let clamped = self
            .brightness
            .clamp(MIN_BRIGHTNESS_PERCENT, MAX_BRIGHTNESS_PERCENT);
        if clamped != self.brightness {
            tracing::warn!(brightness = self.brightness, clamped, "brightness out of range");
            self.brightness = clamped;
        }
        if self.width == 0 || self.height == 0 {
            tracing::warn!(
                width = self.width,
                height = self.height,
                "invalid resolution, using {DEFAULT_WIDTH}x{DEFAULT_HEIGHT}"
            );
            self.width = DEFAULT_WIDTH;
            self.height = DEFAULT_HEIGHT;
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings::new(self.mirrored, self.brightness).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default brightness");
            CaptureSettings::new(self.mirrored, DEFAULT_BRIGHTNESS_PERCENT).unwrap_or_default()
        })
    }

    pub fn model_path_str(&self) -> String {
        self.model_path.to_string_lossy().into_owned()
    }

    pub fn detector_path_str(&self) -> String {
        self.detector_path.to_string_lossy().into_owned()
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable override"),
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FACEFRAME_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok()?;
    Some(base.join("faceframe/config.toml"))
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("faceframe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!((c.width, c.height), (1920, 1080));
        assert_eq!(c.brightness, 100);
        assert!(c.mirrored);
        assert!(c.show_overlay);
        assert!(c.model_path.ends_with("faceframe/models/face_mesh.onnx"));
        assert!(c.detector_path.ends_with("faceframe/models/det_10g.onnx"));
    }

    #[test]
    fn test_detector_path_overrides() {
        let mut c = Config::from_toml("detector_path = \"/opt/models/scrfd.onnx\"\n").unwrap();
        assert_eq!(c.detector_path_str(), "/opt/models/scrfd.onnx");
        c.apply_env(env(&[("FACEFRAME_DETECTOR_PATH", "/srv/det.onnx")]));
        assert_eq!(c.detector_path, PathBuf::from("/srv/det.onnx"));
        assert!(c.model_path.ends_with("face_mesh.onnx"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = Config::from_toml("width = 1280\nheight = 720\nmirrored = false\n").unwrap();
        assert_eq!((c.width, c.height), (1280, 720));
        assert!(!c.mirrored);
        assert_eq!(c.camera_device, "/dev/video0");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::from_toml("brightnes = 120\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut c = Config::from_toml("brightness = 150\ncamera_device = \"/dev/video4\"\n").unwrap();
        c.apply_env(env(&[
            ("FACEFRAME_BRIGHTNESS", "80"),
            ("FACEFRAME_SHOW_OVERLAY", "0"),
            ("FACEFRAME_WIDTH", "wide"),
        ]));
        assert_eq!(c.brightness, 80);
        assert!(!c.show_overlay);
        assert_eq!(c.camera_device, "/dev/video4");
        // Unparsable values leave the previous setting alone.
        assert_eq!(c.width, 1920);
    }

    #[test]
    fn test_normalize_clamps_brightness() {
        let mut c = Config { brightness: 400, ..Config::default() };
        c.normalize();
        assert_eq!(c.brightness, 200);
        let mut c = Config { brightness: 10, width: 0, ..Config::default() };
        c.normalize();
        assert_eq!(c.brightness, 50);
        assert_eq!((c.width, c.height), (1920, 1080));
    }

    #[test]
    fn test_capture_settings_follow_config() {
        let c = Config { brightness: 130, mirrored: false, ..Config::default() };
        let s = c.capture_settings();
        assert_eq!(s.brightness_percent(), 130);
        assert!(!s.mirrored());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/faceframe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
