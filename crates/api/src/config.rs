use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lifeguard_pipeline::{PipelineConfig, StoreConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Detector
/// settings live in `lifeguard_inference::DetectorConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
    /// Directory uploads are staged in while they are processed.
    pub upload_dir: PathBuf,
    pub session_ttl_secs: u64,
    pub session_max_processing_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub max_sessions: usize,
    pub max_concurrent_detections: usize,
    /// Poll period of the live update stream.
    pub live_update_interval_ms: u64,
    pub jpeg_quality: u8,
    /// Font for detection captions. Without one only boxes are drawn.
    pub annotation_font_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            request_timeout_secs: 300,
            max_upload_bytes: 500 * 1024 * 1024,
            upload_dir: std::env::temp_dir().join("lifeguard-uploads"),
            session_ttl_secs: 3600,
            session_max_processing_secs: 7200,
            session_sweep_interval_secs: 60,
            max_sessions: 256,
            max_concurrent_detections: 2,
            live_update_interval_ms: 500,
            jpeg_quality: 80,
            annotation_font_path: None,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                          |
    /// |-------------------------------|----------------------------------|
    /// | `HOST`                        | `0.0.0.0`                        |
    /// | `PORT`                        | `5000`                           |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`        | `300`                            |
    /// | `MAX_UPLOAD_BYTES`            | `524288000`                      |
    /// | `UPLOAD_DIR`                  | `<temp dir>/lifeguard-uploads`   |
    /// | `SESSION_TTL_SECS`            | `3600`                           |
    /// | `SESSION_MAX_PROCESSING_SECS` | `7200`                           |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `60`                             |
    /// | `MAX_SESSIONS`                | `256`                            |
    /// | `MAX_CONCURRENT_DETECTIONS`   | `2`                              |
    /// | `LIVE_UPDATE_INTERVAL_MS`     | `500`                            |
    /// | `JPEG_QUALITY`                | `80`                             |
    /// | `ANNOTATION_FONT_PATH`        | unset                            |
    /// | `LOG_FORMAT`                  | `text` (`json` for JSON lines)   |
    ///
    /// Panics on values that do not parse; misconfiguration should stop the
    /// process at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let jpeg_quality: u8 = parsed(&lookup, "JPEG_QUALITY", defaults.jpeg_quality);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT", defaults.port),
            cors_origins,
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            upload_dir: lookup("UPLOAD_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            session_ttl_secs: parsed(&lookup, "SESSION_TTL_SECS", defaults.session_ttl_secs),
            session_max_processing_secs: parsed(
                &lookup,
                "SESSION_MAX_PROCESSING_SECS",
                defaults.session_max_processing_secs,
            ),
            session_sweep_interval_secs: parsed(
                &lookup,
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.session_sweep_interval_secs,
            )
            .max(1),
            max_sessions: parsed(&lookup, "MAX_SESSIONS", defaults.max_sessions).max(1),
            max_concurrent_detections: parsed(
                &lookup,
                "MAX_CONCURRENT_DETECTIONS",
                defaults.max_concurrent_detections,
            )
            .max(1),
            live_update_interval_ms: parsed(
                &lookup,
                "LIVE_UPDATE_INTERVAL_MS",
                defaults.live_update_interval_ms,
            )
            .max(10),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            annotation_font_path: lookup("ANNOTATION_FONT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            log_format,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.max_sessions,
            ttl: Duration::from_secs(self.session_ttl_secs),
            max_processing: Duration::from_secs(self.session_max_processing_secs),
        }
    }

    /// Pipeline settings; the detector call timeout comes from the detector config.
    pub fn pipeline_config(&self, detector_timeout: Duration) -> PipelineConfig {
        PipelineConfig {
            max_concurrent: self.max_concurrent_detections,
            detector_timeout,
            ..PipelineConfig::default()
        }
    }

    pub fn live_update_interval(&self) -> Duration {
        Duration::from_millis(self.live_update_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.max_upload_bytes, 524_288_000);
        assert_eq!(config.max_sessions, 256);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.annotation_font_path.is_none());
        assert!(config.upload_dir.ends_with("lifeguard-uploads"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,,"),
            ("UPLOAD_DIR", "/var/lib/lifeguard"),
            ("MAX_CONCURRENT_DETECTIONS", "4"),
            ("LOG_FORMAT", "JSON"),
            ("ANNOTATION_FONT_PATH", "/fonts/DejaVuSans.ttf"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.upload_dir, PathBuf::from("/var/lib/lifeguard"));
        assert_eq!(config.max_concurrent_detections, 4);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.annotation_font_path,
            Some(PathBuf::from("/fonts/DejaVuSans.ttf"))
        );
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let config = config(&[
            ("MAX_SESSIONS", "0"),
            ("MAX_CONCURRENT_DETECTIONS", "0"),
            ("JPEG_QUALITY", "0"),
            ("LIVE_UPDATE_INTERVAL_MS", "1"),
        ]);
        assert_eq!(config.max_sessions, 1);
        assert_eq!(config.max_concurrent_detections, 1);
        assert_eq!(config.jpeg_quality, 1);
        assert_eq!(config.live_update_interval(), Duration::from_millis(10));
    }

    #[test]
    #[should_panic(expected = "PORT must be a valid")]
    fn invalid_port_panics() {
        config(&[("PORT", "not-a-port")]);
    }

    #[test]
    fn store_config_carries_limits() {
        let store = config(&[("SESSION_TTL_SECS", "10"), ("MAX_SESSIONS", "3")]).store_config();
        assert_eq!(store.capacity, 3);
        assert_eq!(store.ttl, Duration::from_secs(10));
        assert_eq!(store.max_processing, Duration::from_secs(7200));
    }
}
