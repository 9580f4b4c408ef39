//! Configuration loader.
//!
//! Loading pipeline:
//! 1. Size check and UTF-8 BOM strip
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing into [`SigmaConfig`]
//! 4. Validation
//!
//! Command-line and environment overrides are applied by the caller
//! afterwards via [`ConfigOverrides`].

use std::path::{Path, PathBuf};

use crate::config::schema::SigmaConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_config_size: env_or("SIGMA_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: SigmaConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is too large, if
    /// parsing fails, or if validation finds errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.options.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.options.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Loads and validates configuration text. `path` is used for error
    /// messages only.
    ///
    /// # Errors
    ///
    /// Returns an error if substitution or parsing fails, or if validation
    /// finds errors.
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, path)?;
        let mut warnings = env_sub.warnings;

        let config = parse(&substituted, path)?;

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult { config, warnings })
    }
}

/// Overrides applied on top of a loaded configuration, typically from
/// command-line flags and their environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `serial.port`.
    pub port: Option<String>,
    /// Replaces `serial.baud`.
    pub baud: Option<u32>,
    /// Replaces `api.bind`.
    pub bind: Option<String>,
    /// Forces `serial.enabled` off.
    pub no_serial: bool,
}

impl ConfigOverrides {
    /// Applies the overrides and revalidates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` when an override makes the
    /// configuration invalid.
    pub fn apply(self, mut config: SigmaConfig) -> Result<SigmaConfig, ConfigError> {
        if let Some(port) = self.port {
            config.serial.port = port;
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(bind) = self.bind {
            config.api.bind = bind;
        }
        if self.no_serial {
            config.serial.enabled = false;
        }

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: "command line".to_string(),
                errors: result.errors,
            });
        }
        Ok(config)
    }
}

fn parse(text: &str, path: &Path) -> Result<SigmaConfig, ConfigError> {
    // Syntax first so the error carries a line; a document with only
    // comments parses to null and means "all defaults".
    let root: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| parse_error(path, &e))?;
    if root.is_null() {
        return Ok(SigmaConfig::default());
    }
    serde_yaml::from_str(text).map_err(|e| parse_error(path, &e))
}

fn parse_error(path: &Path, e: &serde_yaml::Error) -> ConfigError {
    ConfigError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text before parsing so substituted values keep YAML
/// type inference.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset, with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let spec = parse_var_spec(&mut chars, source_path)?;
                    match std::env::var(&spec.name) {
                        Ok(value) => result.push_str(&value),
                        Err(_) => match spec.fallback {
                            Some(Fallback::Default(default)) => result.push_str(&default),
                            Some(Fallback::Required(message)) => {
                                return Err(ConfigError::EnvVarNotSet {
                                    var: spec.name,
                                    location: message,
                                });
                            }
                            None => self.warnings.push(LoadWarning {
                                message: format!(
                                    "environment variable '{}' is not set, using empty string",
                                    spec.name
                                ),
                                location: Some(source_path.display().to_string()),
                            }),
                        },
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }
}

struct VarSpec {
    name: String,
    fallback: Option<Fallback>,
}

enum Fallback {
    Default(String),
    Required(String),
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn parse_var_spec(chars: &mut Chars<'_>, path: &Path) -> Result<VarSpec, ConfigError> {
    let mut name = String::new();

    while let Some(c) = chars.next() {
        match c {
            '}' => return Ok(VarSpec { name, fallback: None }),
            ':' => match chars.peek() {
                Some('-') => {
                    chars.next();
                    let default = read_until_close(chars, path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Some(Fallback::Default(default)),
                    });
                }
                Some('?') => {
                    chars.next();
                    let message = read_until_close(chars, path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Some(Fallback::Required(message)),
                    });
                }
                _ => name.push(':'),
            },
            _ => name.push(c),
        }
    }

    Err(unclosed(path, &name))
}

/// Reads until the matching `}`, allowing nested braces.
fn read_until_close(chars: &mut Chars<'_>, path: &Path) -> Result<String, ConfigError> {
    let mut value = String::new();
    let mut depth = 1;

    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(value);
                }
            }
            _ => {}
        }
        value.push(c);
    }

    Err(unclosed(path, &value))
}

fn unclosed(path: &Path, fragment: &str) -> ConfigError {
    ConfigError::ParseError {
        path: PathBuf::from(path),
        line: None,
        message: format!("unclosed environment variable reference: ${{{fragment}"),
    }
}

/// Parses an environment variable, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn substitute(text: &str) -> (Result<String, ConfigError>, Vec<LoadWarning>) {
        let mut sub = EnvSubstitution::new();
        let result = sub.substitute(text, Path::new("sigma.yaml"));
        (result, sub.warnings)
    }

    #[test]
    fn env_substitution_simple() {
        let (result, _) = substitute("path: ${PATH}");
        let result = result.unwrap();
        assert!(!result.contains("${PATH}"));
        assert!(result.len() > "path: ".len());
    }

    #[test]
    fn env_substitution_default() {
        let (result, warnings) = substitute("port: ${SIGMA_TEST_UNSET_PORT_81723:-/dev/ttyUSB1}");
        assert_eq!(result.unwrap(), "port: /dev/ttyUSB1");
        assert!(warnings.is_empty());
    }

    #[test]
    fn env_substitution_required_missing() {
        let (result, _) = substitute("port: ${SIGMA_TEST_UNSET_REQUIRED_81723:?set the port}");
        match result {
            Err(ConfigError::EnvVarNotSet { var, location }) => {
                assert_eq!(var, "SIGMA_TEST_UNSET_REQUIRED_81723");
                assert_eq!(location, "set the port");
            }
            other => panic!("expected EnvVarNotSet, got {other:?}"),
        }
    }

    #[test]
    fn env_substitution_escaped_dollar() {
        let (result, _) = substitute("note: $$5 and $x");
        assert_eq!(result.unwrap(), "note: $5 and $x");
    }

    #[test]
    fn env_substitution_missing_warns() {
        let (result, warnings) = substitute("port: ${SIGMA_TEST_UNSET_WARN_81723}");
        assert_eq!(result.unwrap(), "port: ");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("SIGMA_TEST_UNSET_WARN_81723"));
    }

    #[test]
    fn env_substitution_unclosed_is_parse_error() {
        let (result, _) = substitute("port: ${OOPS");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn empty_and_comment_only_documents_are_defaults() {
        let loader = ConfigLoader::default();
        for text in ["", "# nothing here\n", "\u{feff}"] {
            let loaded = loader.load_str(text, Path::new("sigma.yaml")).unwrap();
            assert_eq!(loaded.config, SigmaConfig::default());
        }
    }

    #[test]
    fn parse_error_carries_line() {
        let loader = ConfigLoader::default();
        let err = loader
            .load_str("serial:\n  baud: [1,\n", Path::new("bad.yaml"))
            .unwrap_err();
        match err {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn validation_errors_abort() {
        let loader = ConfigLoader::default();
        let err = loader
            .load_str(
                "allocator:\n  min_green: 60\n  max_green: 30\n",
                Path::new("sigma.yaml"),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_warnings_are_returned() {
        let loader = ConfigLoader::default();
        let loaded = loader
            .load_str("engine:\n  tick: 2s\n", Path::new("sigma.yaml"))
            .unwrap();
        assert_eq!(loaded.config.engine.tick, Duration::from_secs(2));
        assert!(
            loaded
                .warnings
                .iter()
                .any(|w| w.location.as_deref() == Some("engine.tick"))
        );
    }

    #[test]
    fn overrides_replace_fields() {
        let config = ConfigOverrides {
            port: Some("COM9".to_string()),
            baud: Some(9600),
            bind: Some("0.0.0.0:9000".to_string()),
            no_serial: true,
        }
        .apply(SigmaConfig::default())
        .unwrap();
        assert_eq!(config.serial.port, "COM9");
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.api.bind, "0.0.0.0:9000");
        assert!(!config.serial.enabled);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let result = ConfigOverrides {
            baud: Some(0),
            ..ConfigOverrides::default()
        }
        .apply(SigmaConfig::default());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
