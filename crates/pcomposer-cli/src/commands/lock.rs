//! `pcomposer lock` and `pcomposer unlock`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn info(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let info = check(json, project.lock_info())?;

    if json {
        return print_ok("lock", &info);
    }

    let Some(info) = info else {
        println!("No lock file found.");
        return Ok(());
    };

    println!("Lock file: {}", info.path.display());
    println!(
        "Generated: {}",
        info.generated.as_deref().unwrap_or("unknown")
    );
    println!();

    if info.packages.is_empty() {
        println!("No packages locked.");
        return Ok(());
    }

    println!("Locked packages:");
    for (name, entry) in &info.packages {
        let version = entry
            .version
            .as_deref()
            .or(entry.constraint.as_deref())
            .unwrap_or("unknown");
        println!("  {name}: {version} (locked at: {})", entry.locked_at);
    }
    Ok(())
}

pub fn unlock(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let removed = check(json, project.unlock())?;

    if json {
        return print_ok("removed", removed);
    }

    if removed {
        println!("Lock file removed. Next install will resolve fresh versions.");
    } else {
        println!("No lock file found.");
    }
    Ok(())
}
