//! Configuration from the environment.

use crate::adapters::ffmpeg::FfmpegExtractor;
use crate::adapters::model::default_loader;
use crate::application::orchestrator::Orchestrator;
use crate::application::separator::{DeviceGate, Separator};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Where uploaded videos are staged until their job ends
    pub upload_dir: PathBuf,
    /// Where web jobs write their results
    pub output_dir: PathBuf,
    /// Extraction executable
    pub ffmpeg_bin: PathBuf,
    /// Directory holding `<model id>.onnx` files
    pub model_dir: PathBuf,
    pub extraction_timeout: Duration,
    pub separation_timeout: Duration,
    /// Parent of per-run workspaces; `None` uses the system temp dir
    pub workspace_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    /// Concurrent inferences allowed on the compute device
    pub device_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| String::from(default));
        let number = |key: &str, default: u64| parse_or(lookup(key), key, default);

        Self {
            addr: string("ADDR", "127.0.0.1"),
            port: string("PORT", "5050"),
            upload_dir: PathBuf::from(string("UPLOAD_DIR", "./uploads")),
            output_dir: PathBuf::from(string("OUTPUT_DIR", "./outputs")),
            ffmpeg_bin: PathBuf::from(string("FFMPEG_BIN", "ffmpeg")),
            model_dir: PathBuf::from(string("MODEL_DIR", "./models")),
            extraction_timeout: Duration::from_secs(number("EXTRACTION_TIMEOUT_SECS", 3600)),
            separation_timeout: Duration::from_secs(number("SEPARATION_TIMEOUT_SECS", 7200)),
            workspace_dir: lookup("WORKSPACE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            max_upload_bytes: parse_or(lookup("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            device_slots: parse_or(lookup("DEVICE_SLOTS"), "DEVICE_SLOTS", 1usize).max(1),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    /// Wire the production extractor and model backend.
    pub fn orchestrator(&self) -> Orchestrator {
        let extractor = FfmpegExtractor::new(&self.ffmpeg_bin).with_timeout(self.extraction_timeout);
        let separator = Separator::new(default_loader(&self.model_dir), DeviceGate::new(self.device_slots))
            .with_timeout(self.separation_timeout);
        let orchestrator = Orchestrator::new(Arc::new(extractor), separator);
        match &self.workspace_dir {
            Some(dir) => orchestrator.with_workspace_root(dir),
            None => orchestrator,
        }
    }
}

fn parse_or<T: FromStr + Copy>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:5050");
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.output_dir, PathBuf::from("./outputs"));
        assert_eq!(config.ffmpeg_bin, PathBuf::from("ffmpeg"));
        assert_eq!(config.extraction_timeout, Duration::from_secs(3600));
        assert_eq!(config.separation_timeout, Duration::from_secs(7200));
        assert_eq!(config.workspace_dir, None);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.device_slots, 1);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("PORT", "8080"),
            ("FFMPEG_BIN", "/opt/ffmpeg/bin/ffmpeg"),
            ("SEPARATION_TIMEOUT_SECS", "60"),
            ("WORKSPACE_DIR", "/scratch"),
            ("DEVICE_SLOTS", "2"),
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.ffmpeg_bin, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.separation_timeout, Duration::from_secs(60));
        assert_eq!(config.workspace_dir, Some(PathBuf::from("/scratch")));
        assert_eq!(config.device_slots, 2);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = config_with(&[
            ("EXTRACTION_TIMEOUT_SECS", "soon"),
            ("DEVICE_SLOTS", "0"),
            ("WORKSPACE_DIR", "  "),
        ]);
        assert_eq!(config.extraction_timeout, Duration::from_secs(3600));
        assert_eq!(config.device_slots, 1);
        assert_eq!(config.workspace_dir, None);
    }
}
