use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "rollcall.toml";

/// Runtime configuration: defaults, then `rollcall.toml`, then `ROLLCALL_*`
/// environment variables. Command-line flags are applied last by `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory of reference images, one per person (`<name>.png`).
    pub gallery_dir: PathBuf,
    /// Attendance CSV file.
    pub ledger_path: PathBuf,
    /// Maximum Euclidean distance accepted as a match. Lower is stricter.
    pub threshold: f32,
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Frames discarded after the camera starts (auto-exposure settling).
    pub warmup_frames: usize,
    /// Give up after this many frames without a recognition; 0 = never.
    pub max_frames: usize,
    /// Seconds to keep the result on screen after a session completes.
    pub hold_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("known_faces"),
            ledger_path: PathBuf::from("attendance.csv"),
            threshold: rollcall_core::DEFAULT_THRESHOLD,
            camera_device: "/dev/video0".to_string(),
            model_dir: rollcall_core::default_model_dir(),
            warmup_frames: 4,
            max_frames: 0,
            hold_secs: 5,
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(|| Some(PathBuf::from(CONFIG_FILE)).filter(|p| p.exists()));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `ROLLCALL_*` variables. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("ROLLCALL_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = var("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        env_parse(&var, "ROLLCALL_THRESHOLD", &mut self.threshold);
        env_parse(&var, "ROLLCALL_WARMUP_FRAMES", &mut self.warmup_frames);
        env_parse(&var, "ROLLCALL_MAX_FRAMES", &mut self.max_frames);
        env_parse(&var, "ROLLCALL_HOLD_SECS", &mut self.hold_secs);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            bail!("threshold must be a positive number, got {}", self.threshold);
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = var(key) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gallery_dir, PathBuf::from("known_faces"));
        assert_eq!(config.ledger_path, PathBuf::from("attendance.csv"));
        assert_eq!(config.threshold, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("threshold = 0.45\ngallery_dir = \"faces\"\n").unwrap();
        assert_eq!(config.threshold, 0.45);
        assert_eq!(config.gallery_dir, PathBuf::from("faces"));
        assert_eq!(config.hold_secs, 5);
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        assert!(toml::from_str::<Config>("treshold = 0.4\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ROLLCALL_LEDGER_PATH", "/var/lib/rollcall/attendance.csv"),
            ("ROLLCALL_THRESHOLD", "0.6"),
            ("ROLLCALL_MAX_FRAMES", "many"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.ledger_path, PathBuf::from("/var/lib/rollcall/attendance.csv"));
        assert_eq!(config.threshold, 0.6);
        assert_eq!(config.max_frames, 0);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "camera_device = \"/dev/video2\"\nmax_frames = 300\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.max_frames, 300);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        for threshold in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = Config { threshold, ..Config::default() };
            assert!(config.validate().is_err(), "threshold {threshold} accepted");
        }
    }
}
