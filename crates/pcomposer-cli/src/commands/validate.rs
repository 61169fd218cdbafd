//! `pcomposer validate`.

use super::{check, fail, open, print_ok};
use miette::Result;
use pcomposer_core::pkg::pkg_codes;
use pcomposer_core::Config;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let errors = check(json, project.validate())?;

    if errors.is_empty() {
        if json {
            return print_ok("valid", true);
        }
        println!("composer.json is valid");
        return Ok(());
    }

    if !json {
        for error in &errors {
            eprintln!("  - {error}");
        }
    }
    fail(
        json,
        pkg_codes::PKG_MANIFEST_INVALID,
        &format!("composer.json is invalid: {}", errors.join("; ")),
    )
}
