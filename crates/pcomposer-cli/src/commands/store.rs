//! `pcomposer clear-cache` and `pcomposer stats`.

use super::{check, open, print_ok};
use miette::Result;
use pcomposer_core::Config;

pub fn clear_cache(config: &Config, json: bool) -> Result<()> {
    let mut project = open(config, json)?;
    check(json, project.clear_cache())?;

    if json {
        return print_ok("cleared", project.store().root());
    }
    println!("Cleared global store at {}", project.store().root().display());
    Ok(())
}

pub fn stats(config: &Config, json: bool) -> Result<()> {
    let project = open(config, json)?;
    let stats = project.store_stats();

    if json {
        return print_ok("stats", &stats);
    }

    println!("Store: {}", stats.store_path.display());
    println!("Packages: {}", stats.total_packages);
    println!("Size: {}", format_bytes(stats.total_size));
    if !stats.packages_by_vendor.is_empty() {
        println!("By vendor:");
        for (vendor, count) in &stats.packages_by_vendor {
            println!("  {vendor}: {count}");
        }
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
