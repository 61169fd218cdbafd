//! Command implementations.
//!
//! Every command prints either human-readable text or a single JSON object
//! (`{"ok": true, ...}`) on stdout.

pub mod autoload;
pub mod install;
pub mod list;
pub mod lock;
pub mod remove;
pub mod repair;
pub mod store;
pub mod validate;
pub mod version;

use miette::{IntoDiagnostic, Result};
use pcomposer_core::pkg::{PkgError, Project};
use pcomposer_core::Config;

/// Report a failure and exit non-zero.
///
/// With `--json` the error is printed to stdout as
/// `{"ok": false, "error": {"code", "message"}}` and the process exits 1.
/// Otherwise it is returned as a diagnostic.
pub fn fail<T>(json: bool, code: &str, message: &str) -> Result<T> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": code,
                    "message": message
                }
            })
        );
        std::process::exit(1);
    }
    Err(miette::miette!("[{code}] {message}"))
}

/// Unwrap a package manager result, reporting the error with [`fail`].
pub fn check<T>(json: bool, result: Result<T, PkgError>) -> Result<T> {
    result.or_else(|e| fail(json, e.code(), &e.to_string()))
}

/// Open the project for `config.cwd`.
pub fn open(config: &Config, json: bool) -> Result<Project> {
    check(json, Project::open(config))
}

/// Print `{"ok": true, key: value}`.
pub fn print_ok(key: &str, value: impl serde::Serialize) -> Result<()> {
    let value = serde_json::to_value(value).into_diagnostic()?;
    let mut out = serde_json::Map::new();
    out.insert("ok".to_string(), serde_json::Value::Bool(true));
    out.insert(key.to_string(), value);
    let text = serde_json::to_string_pretty(&out).into_diagnostic()?;
    println!("{text}");
    Ok(())
}
