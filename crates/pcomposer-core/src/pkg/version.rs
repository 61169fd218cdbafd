//! Version ordering and constraint resolution.
//!
//! Versions are ordered the way PHP's `version_compare` orders them:
//! numeric components compare numerically, and word components rank as
//! `dev < alpha < beta < RC < (number) < pl`. Constraints follow a
//! deliberately small policy (`*`, exact, `^`, `~`, closest match); there is
//! no range algebra and no backtracking across packages.

use super::error::PkgError;
use std::cmp::Ordering;

/// Pre-release markers excluded when resolving `*`.
const PRERELEASE_MARKERS: &[&str] = &["dev", "alpha", "beta", "rc"];

/// Result of resolving one constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The selected version, verbatim from the available set.
    pub version: String,
    /// Set when the closest-match fallback substituted a version.
    pub warning: Option<String>,
}

impl Resolution {
    fn exact(version: &str) -> Self {
        Self {
            version: version.to_string(),
            warning: None,
        }
    }
}

/// Picks one version out of the versions a registry offers.
///
/// Implementations see one package at a time.
pub trait VersionResolver {
    /// Resolve `constraint` for package `name` against `available`.
    ///
    /// # Errors
    /// Returns `NoCompatibleVersion` when nothing can be selected.
    fn resolve(
        &self,
        name: &str,
        constraint: &str,
        available: &[String],
    ) -> Result<Resolution, PkgError>;
}

/// Greedy per-package resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyResolver;

impl VersionResolver for GreedyResolver {
    fn resolve(
        &self,
        name: &str,
        constraint: &str,
        available: &[String],
    ) -> Result<Resolution, PkgError> {
        if available.is_empty() {
            return Err(PkgError::no_compatible_version(name, constraint));
        }

        let constraint = constraint.trim();

        if constraint == "*" {
            let stable: Vec<&String> = available.iter().filter(|v| !is_prerelease(v)).collect();
            let pick = if stable.is_empty() {
                max_version(available.iter())
            } else {
                max_version(stable.into_iter())
            };
            return pick
                .map(Resolution::exact)
                .ok_or_else(|| PkgError::no_compatible_version(name, constraint));
        }

        if let Some(v) = available.iter().find(|v| v.as_str() == constraint) {
            return Ok(Resolution::exact(v));
        }

        if let Some(base) = constraint.strip_prefix('^') {
            let upper = next_major(base);
            if let Some(v) = max_in_range(available, base, &upper) {
                return Ok(Resolution::exact(v));
            }
        } else if let Some(base) = constraint.strip_prefix('~') {
            let upper = next_minor(base);
            if let Some(v) = max_in_range(available, base, &upper) {
                return Ok(Resolution::exact(v));
            }
        }

        let picked = closest_match(constraint, available)
            .ok_or_else(|| PkgError::no_compatible_version(name, constraint))?;

        Ok(Resolution {
            version: picked.to_string(),
            warning: Some(format!(
                "No exact match for {name} {constraint}, using closest version {picked}"
            )),
        })
    }
}

/// Whether `version` carries a pre-release marker.
///
/// Markers are matched case-sensitively, so `2.0.0-RC1` counts as stable.
#[must_use]
pub fn is_prerelease(version: &str) -> bool {
    PRERELEASE_MARKERS.iter().any(|m| version.contains(m))
}

/// Highest version `>= base`, else the highest version overall.
fn closest_match<'a>(constraint: &str, available: &'a [String]) -> Option<&'a str> {
    let base = strip_operator(constraint);
    max_version(
        available
            .iter()
            .filter(|v| compare_versions(v, base) != Ordering::Less),
    )
    .or_else(|| max_version(available.iter()))
}

fn strip_operator(constraint: &str) -> &str {
    let rest = if let Some(r) = constraint.strip_prefix(">=") {
        r
    } else if let Some(r) = constraint
        .strip_prefix('^')
        .or_else(|| constraint.strip_prefix('~'))
        .or_else(|| constraint.strip_prefix('>'))
    {
        r
    } else {
        constraint
    };
    rest.trim()
}

fn max_in_range<'a>(available: &'a [String], lower: &str, upper: &str) -> Option<&'a str> {
    max_version(available.iter().filter(|v| {
        compare_versions(v, lower) != Ordering::Less && compare_versions(v, upper) == Ordering::Less
    }))
}

/// Maximum of `versions` under [`compare_versions`]; ties keep the first seen.
pub fn max_version<'a, I, S>(versions: I) -> Option<&'a str>
where
    I: Iterator<Item = &'a S>,
    S: AsRef<str> + 'a + ?Sized,
{
    versions.map(AsRef::<str>::as_ref).fold(None, |best, v| match best {
        Some(b) if compare_versions(v, b) != Ordering::Greater => Some(b),
        _ => Some(v),
    })
}

/// `X.Y.Z` -> `(X+1).0.0`.
#[must_use]
pub fn next_major(version: &str) -> String {
    let mut parts = version.split('.');
    let major = leading_int(parts.next().unwrap_or(""));
    format!("{}.0.0", major + 1)
}

/// `X.Y.Z` -> `X.(Y+1).0`.
#[must_use]
pub fn next_minor(version: &str) -> String {
    let mut parts = version.split('.');
    let major = leading_int(parts.next().unwrap_or(""));
    let minor = leading_int(parts.next().unwrap_or(""));
    format!("{major}.{}.0", minor + 1)
}

fn leading_int(part: &str) -> u64 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Compare two version strings with `version_compare` semantics.
///
/// ```
/// use pcomposer_core::pkg::compare_versions;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
/// assert_eq!(compare_versions("1.0.0-beta", "1.0.0"), Ordering::Less);
/// assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
/// ```
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let ca = canonicalize(a);
    let cb = canonicalize(b);
    match (ca.is_empty(), cb.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let pa: Vec<&str> = ca.split('.').collect();
    let pb: Vec<&str> = cb.split('.').collect();

    for (x, y) in pa.iter().zip(pb.iter()) {
        let ord = compare_parts(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match pa.len().cmp(&pb.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => trailing_order(pa[pb.len()]),
        Ordering::Less => trailing_order(pb[pa.len()]).reverse(),
    }
}

/// Order of a version that has `part` left over against one that ran out.
fn trailing_order(part: &str) -> Ordering {
    if starts_with_digit(part) {
        Ordering::Greater
    } else {
        special_rank(part).cmp(&NUMBER_RANK)
    }
}

const NUMBER_RANK: i8 = 4;

fn special_rank(part: &str) -> i8 {
    const FORMS: &[(&str, i8)] = &[
        ("dev", 0),
        ("alpha", 1),
        ("a", 1),
        ("beta", 2),
        ("b", 2),
        ("RC", 3),
        ("rc", 3),
        ("#", NUMBER_RANK),
        ("pl", 5),
        ("p", 5),
    ];
    FORMS
        .iter()
        .find(|(form, _)| part.starts_with(form))
        .map_or(-1, |(_, rank)| *rank)
}

fn compare_parts(x: &str, y: &str) -> Ordering {
    match (starts_with_digit(x), starts_with_digit(y)) {
        (true, true) => compare_numeric(x, y),
        (false, false) => special_rank(x).cmp(&special_rank(y)),
        (true, false) => NUMBER_RANK.cmp(&special_rank(y)),
        (false, true) => special_rank(x).cmp(&NUMBER_RANK),
    }
}

fn compare_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn starts_with_digit(part: &str) -> bool {
    part.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

/// Normalise separators: `-`, `_`, `+` and any other non-alphanumeric become
/// `.`, and a `.` is inserted wherever digits meet letters.
fn canonicalize(version: &str) -> String {
    let mut out = String::with_capacity(version.len() * 2);
    let mut prev: Option<char> = None;

    for c in version.trim().chars() {
        let needs_dot = match prev {
            None => false,
            Some(p) => {
                !c.is_ascii_alphanumeric()
                    || (p.is_ascii_digit() && c.is_ascii_alphabetic())
                    || (p.is_ascii_alphabetic() && c.is_ascii_digit())
            }
        };

        if needs_dot && !out.ends_with('.') {
            out.push('.');
        }
        if c.is_ascii_alphanumeric() || prev.is_none() {
            out.push(c);
        }
        prev = Some(c);
    }

    out
}
