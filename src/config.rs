//! Check configuration types and `typtag.toml` loading.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::checker::Severity;

/// Name of the configuration file looked up next to checked files.
pub const CONFIG_FILE: &str = "typtag.toml";

/// Diagnostic output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `error[E113]: ...` lines with file locations
    #[default]
    Human,
    /// A JSON array of diagnostics
    Json,
}

/// Configuration for one checker run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Passes the driver may take before giving up (default: 10)
    pub pass_limit: u32,
    /// Severity of `===`/`!==` between operands of one known type
    pub strict_equality: Severity,
    /// Whether info diagnostics are rendered
    pub show_info: bool,
    pub format: OutputFormat,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            pass_limit: 10,
            strict_equality: Severity::Error,
            show_info: false,
            format: OutputFormat::Human,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    check: CheckConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("pass_limit must be at least 1")]
    PassLimit,
}

impl CheckConfig {
    /// Load configuration from a `typtag.toml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        file.check.validate()?;
        Ok(file.check)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pass_limit == 0 {
            return Err(ConfigError::PassLimit);
        }
        Ok(())
    }

    /// Find the nearest `typtag.toml` in the directory of `file` or any of
    /// its ancestors.
    pub fn discover(file: &Path) -> Option<PathBuf> {
        let dir = file.parent().unwrap_or(Path::new("."));
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

        dir.ancestors()
            .map(|ancestor| ancestor.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Configuration for checking `file`: the discovered `typtag.toml`, or
    /// the defaults when there is none.
    pub fn for_file(file: &Path) -> Result<Self, ConfigError> {
        match Self::discover(file) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using config file");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CheckConfig::default();
        assert_eq!(config.pass_limit, 10);
        assert_eq!(config.strict_equality, Severity::Error);
        assert!(!config.show_info);
        assert_eq!(config.format, OutputFormat::Human);
    }

    #[test]
    fn test_parse_partial_table() {
        let config = CheckConfig::parse(
            "[check]\npass_limit = 3\nstrict_equality = \"info\"\n",
            Path::new(CONFIG_FILE),
        )
        .unwrap();
        assert_eq!(config.pass_limit, 3);
        assert_eq!(config.strict_equality, Severity::Info);
        assert_eq!(config.format, OutputFormat::Human);
    }

    #[test]
    fn test_parse_empty_file() {
        let config = CheckConfig::parse("", Path::new(CONFIG_FILE)).unwrap();
        assert_eq!(config, CheckConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = CheckConfig::parse("[check]\npasses = 3\n", Path::new(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse typtag.toml"));

        let err = CheckConfig::parse("[lint]\n", Path::new(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_pass_limit_rejected() {
        let err = CheckConfig::parse("[check]\npass_limit = 0\n", Path::new(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::PassLimit));
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[check]\nformat = \"json\"\nshow_info = true\n",
        )
        .unwrap();
        let file = nested.join("main.js");
        fs::write(&file, "var a = 1;").unwrap();

        let found = CheckConfig::discover(&file).unwrap();
        assert_eq!(found.file_name().unwrap(), CONFIG_FILE);

        let config = CheckConfig::for_file(&file).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.show_info);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = CheckConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
