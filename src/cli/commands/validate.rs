//! `validate` command handler.
//!
//! Loads each file through the same loader `run` uses and reports the
//! outcome per file. Every file is checked even after a failure.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, Severity, SigmaError, ValidationIssue};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate configuration files without starting the controller.
///
/// # Errors
///
/// Returns a config error naming the first file that failed, after every
/// file has been reported.
pub fn run(args: &ValidateArgs) -> Result<(), SigmaError> {
    let loader = ConfigLoader::default();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_failure = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let (report, failure) = check(&loader, path, args.strict);
        if first_failure.is_none() {
            first_failure = failure;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_failure.map_or(Ok(()), |e| Err(e.into()))
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> (FileReport, Option<ConfigError>) {
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(result) => {
            let warnings: Vec<String> = result.warnings.iter().map(ToString::to_string).collect();
            let failure = (strict && !warnings.is_empty()).then(|| ConfigError::ValidationError {
                path: file.clone(),
                errors: result
                    .warnings
                    .into_iter()
                    .map(|w| ValidationIssue {
                        path: w.location.unwrap_or_default(),
                        message: w.message,
                        severity: Severity::Error,
                    })
                    .collect(),
            });
            let report = FileReport {
                file,
                valid: failure.is_none(),
                errors: Vec::new(),
                warnings,
            };
            (report, failure)
        }
        Err(e) => {
            let errors = match &e {
                ConfigError::ValidationError { errors, .. } => {
                    errors.iter().map(ToString::to_string).collect()
                }
                other => vec![other.to_string()],
            };
            let report = FileReport {
                file,
                valid: false,
                errors,
                warnings: Vec::new(),
            };
            (report, Some(e))
        }
    }
}

fn print_human(report: &FileReport) {
    let status = if report.valid { "ok" } else { "invalid" };
    println!("{}: {status}", report.file);
    for error in &report.errors {
        println!("  {error}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn valid_file_passes() {
        let f = file("serial:\n  port: /dev/ttyUSB0\n");
        let (report, failure) = check(&ConfigLoader::default(), f.path(), false);
        assert!(report.valid);
        assert!(failure.is_none());
    }

    #[test]
    fn invalid_file_lists_issues() {
        let f = file("serial:\n  baud: 0\nallocator:\n  min_weight: 0\n");
        let (report, failure) = check(&ConfigLoader::default(), f.path(), false);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("serial.baud"));
        assert!(matches!(failure, Some(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn strict_turns_warnings_into_failure() {
        let f = file("engine:\n  tick: 2s\n");
        let (lenient, failure) = check(&ConfigLoader::default(), f.path(), false);
        assert!(lenient.valid);
        assert_eq!(lenient.warnings.len(), 1);
        assert!(failure.is_none());

        let (strict, failure) = check(&ConfigLoader::default(), f.path(), true);
        assert!(!strict.valid);
        assert!(failure.is_some());
    }

    #[test]
    fn missing_file_is_reported() {
        let (report, failure) =
            check(&ConfigLoader::default(), Path::new("/nonexistent/sigma.yaml"), false);
        assert!(!report.valid);
        assert!(matches!(failure, Some(ConfigError::MissingFile { .. })));
    }
}
