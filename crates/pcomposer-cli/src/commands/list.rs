//! `pcomposer list` and `pcomposer show`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn list(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let packages = check(json, project.list())?;

    if json {
        return print_ok("packages", &packages);
    }

    if packages.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages:");
    for pkg in &packages {
        let dev = if pkg.dev { " [dev]" } else { "" };
        match &pkg.installed {
            Some(v) => println!("  {}: {}{dev} (installed: {v})", pkg.name, pkg.constraint),
            None => println!("  {}: {}{dev}", pkg.name, pkg.constraint),
        }
    }
    Ok(())
}

pub fn show(config: &Config, package: &str, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let record = project.show(package);

    if json {
        return print_ok("package", &record);
    }

    let Some(record) = record else {
        println!("Package '{package}' not found in global store.");
        return Ok(());
    };

    let deps: Vec<String> = record
        .dependencies
        .iter()
        .map(|(name, constraint)| format!("{name} {constraint}"))
        .collect();

    println!("Package: {}", record.name);
    println!("Version: {}", record.version);
    println!("Path: {}", record.path.display());
    println!("Dependencies: {}", deps.join(", "));
    println!("Installed at: {}", record.installed_at);
    Ok(())
}
