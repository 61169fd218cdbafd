//! `pcomposer dump-autoload`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let path = check(json, project.dump_autoload())?;

    if json {
        return print_ok("autoload", &path);
    }
    println!("Generated {}", path.display());
    Ok(())
}
