use std::time::Duration;

use crate::detector::DetectorError;

/// Which model to load and where it is served.
///
/// | Env Var                  | Default                 |
/// |--------------------------|-------------------------|
/// | `DETECTOR_URL`           | `http://127.0.0.1:8500` |
/// | `DETECTOR_MODEL`         | `drowning`              |
/// | `DETECTOR_MODEL_VERSION` | unset (any version)     |
/// | `DETECTOR_TIMEOUT_SECS`  | `30`                    |
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub base_url: String,
    pub model: String,
    /// When set, loading fails unless the server reports this exact version.
    pub model_version: Option<String>,
    pub request_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8500".to_string(),
            model: "drowning".to_string(),
            model_version: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DetectorConfig {
    pub fn from_env() -> Result<Self, DetectorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DetectorError> {
        let defaults = Self::default();

        let base_url = lookup("DETECTOR_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(DetectorError::Config(format!(
                "DETECTOR_URL must be an http(s) URL, got '{base_url}'"
            )));
        }

        let model = lookup("DETECTOR_MODEL")
            .map(|m| m.trim().to_string())
            .unwrap_or(defaults.model);
        if model.is_empty() {
            return Err(DetectorError::Config(
                "DETECTOR_MODEL must not be empty".to_string(),
            ));
        }

        let model_version = lookup("DETECTOR_MODEL_VERSION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let request_timeout = match lookup("DETECTOR_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    DetectorError::Config(format!(
                        "DETECTOR_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    ))
                })?;
                Duration::from_secs(secs.max(1))
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            base_url,
            model,
            model_version,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = DetectorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = DetectorConfig::from_lookup(lookup(&[
            ("DETECTOR_URL", "https://infer.internal:9000/"),
            ("DETECTOR_MODEL", "pool-v2"),
            ("DETECTOR_MODEL_VERSION", "2.1.0"),
            ("DETECTOR_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://infer.internal:9000");
        assert_eq!(config.model, "pool-v2");
        assert_eq!(config.model_version.as_deref(), Some("2.1.0"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_version_means_any() {
        let config =
            DetectorConfig::from_lookup(lookup(&[("DETECTOR_MODEL_VERSION", "  ")])).unwrap();
        assert!(config.model_version.is_none());
    }

    #[test]
    fn rejects_non_http_url() {
        let err = DetectorConfig::from_lookup(lookup(&[("DETECTOR_URL", "ftp://x")])).unwrap_err();
        assert!(matches!(err, DetectorError::Config(_)));
    }

    #[test]
    fn rejects_bad_timeout() {
        let err =
            DetectorConfig::from_lookup(lookup(&[("DETECTOR_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, DetectorError::Config(_)));
    }
}
