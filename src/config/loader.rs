//! Session configuration loader
//!
//! File → YAML parse → environment overrides → validation. Overrides
//! let a deployment point an unchanged session file at another range:
//! `RANGEVIEW_BACKEND_URL` and `RANGEVIEW_PUSH_URL`.

use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;

use super::schema::SessionConfig;
use super::validation::Validator;

/// Loads and validates session configurations.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a session file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if the path does not exist,
    /// [`ConfigError::ParseError`] on malformed YAML, and
    /// [`ConfigError::ValidationError`] when validation finds errors
    /// (warnings alone do not fail the load).
    pub fn load(path: &Path) -> Result<SessionConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::parse(&text).map_err(|message| ConfigError::ParseError {
            path: path.to_path_buf(),
            message,
        })?;
        Self::finish(config, &path.display().to_string())
    }

    /// Loads a session from YAML text (tests, embedded defaults).
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) minus the file checks.
    pub fn load_str(text: &str) -> Result<SessionConfig, ConfigError> {
        let config = Self::parse(text).map_err(|message| ConfigError::ParseError {
            path: "<inline>".into(),
            message,
        })?;
        Self::finish(config, "<inline>")
    }

    /// Default configuration with environment overrides applied.
    #[must_use]
    pub fn defaults() -> SessionConfig {
        let mut config = SessionConfig::default();
        Self::apply_env_overrides(&mut config);
        config
    }

    fn parse(text: &str) -> Result<SessionConfig, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    fn finish(mut config: SessionConfig, origin: &str) -> Result<SessionConfig, ConfigError> {
        Self::apply_env_overrides(&mut config);

        let issues = Validator::validate(&config);
        for issue in issues
            .iter()
            .filter(|issue| issue.severity == crate::error::Severity::Warning)
        {
            tracing::warn!(%issue, "configuration warning");
        }
        if Validator::has_errors(&issues) {
            return Err(ConfigError::ValidationError {
                path: origin.to_string(),
                errors: issues,
            });
        }
        debug!(origin, "session configuration loaded");
        Ok(config)
    }

    fn apply_env_overrides(config: &mut SessionConfig) {
        if let Ok(url) = std::env::var("RANGEVIEW_BACKEND_URL")
            && !url.is_empty()
        {
            config.backend.base_url = url;
        }
        if let Ok(url) = std::env::var("RANGEVIEW_PUSH_URL")
            && !url.is_empty()
        {
            config.push.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file() {
        let err = ConfigLoader::load(Path::new("/nonexistent/session.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend:\n  base_url: http://range:8000").unwrap();
        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://range:8000");
    }

    #[test]
    fn test_load_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend: [not, a, mapping").unwrap();
        let err = ConfigLoader::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_str_validation_failure() {
        let err = ConfigLoader::load_str("push:\n  url: http://not-a-ws\n").unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert!(errors.iter().any(|issue| issue.path == "push.url"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_str_empty_is_defaults() {
        let config = ConfigLoader::load_str("{}").unwrap();
        assert_eq!(config.attack.default_type, "auto");
    }
}
