//! `pcomposer repair`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let report = check(json, project.repair_links())?;

    if json {
        return print_ok("repair", &report);
    }

    if report.repaired.is_empty() && report.removed.is_empty() {
        println!("No broken links found.");
        return Ok(());
    }
    for name in &report.repaired {
        println!("  repaired {name}");
    }
    for name in &report.removed {
        println!("  removed {name} (not in global store)");
    }
    Ok(())
}
