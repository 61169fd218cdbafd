//! `pcomposer remove`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn run(config: &Config, package: &str, json: bool) -> Result<()> {
    let mut project = open(config, json)?;
    let summary = check(json, project.remove(package))?;

    if json {
        return print_ok("remove", &summary);
    }

    if summary.removed_from_manifest {
        println!("Removed {package} from composer.json");
    } else {
        println!("{package} is not listed in composer.json");
    }
    if summary.unlinked {
        println!("Removed vendor/{package}");
    }
    println!("Generated {}", summary.autoload.display());
    Ok(())
}
