//! `pcomposer install`, `update` and `require`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::pkg::{InstallMode, InstallSummary};
use pcomposer_core::Config;
use tracing::info;

pub fn install(config: &Config, json: bool) -> Result<()> {
    info!(cwd = %config.cwd.display(), "install");
    let mut project = open(config, json)?;
    let summary = check(json, project.install())?;
    report(&summary, json)
}

pub fn update(config: &Config, json: bool) -> Result<()> {
    info!(cwd = %config.cwd.display(), "update");
    let mut project = open(config, json)?;
    let summary = check(json, project.update())?;
    report(&summary, json)
}

pub fn require(
    config: &Config,
    package: &str,
    constraint: Option<&str>,
    dev: bool,
    json: bool,
) -> Result<()> {
    let mut project = open(config, json)?;
    if !json {
        match constraint {
            Some(c) => println!("Adding package: {package} ({c})"),
            None => println!("Adding package: {package}"),
        }
    }
    let summary = check(json, project.require(package, constraint, dev))?;
    report(&summary, json)
}

fn report(summary: &InstallSummary, json: bool) -> Result<()> {
    if json {
        return print_ok("install", summary);
    }

    for warning in &summary.report.warnings {
        eprintln!("warning: {warning}");
    }

    match summary.mode {
        InstallMode::NothingToInstall => {
            println!("No dependencies to install.");
            return Ok(());
        }
        InstallMode::FromLock => println!("Using locked versions from pcomposer.lock"),
        InstallMode::Resolved => println!("Resolved versions and wrote pcomposer.lock"),
    }

    for pkg in &summary.report.downloaded {
        println!("  + {} ({})", pkg.name, pkg.version);
    }
    if !summary.report.reused.is_empty() {
        println!(
            "  = {} package(s) reused from the global store",
            summary.report.reused.len()
        );
    }
    for (name, version) in &summary.locked {
        println!("  {name}: {version}");
    }
    println!("Linked {} package(s) into vendor/", summary.linked.len());
    if let Some(path) = &summary.autoload {
        println!("Generated {}", path.display());
    }

    Ok(())
}
