//! Version normalization and comparison
//!
//! Published versions come as dotted numbers (`1.04`), dates (`2025-11-07`)
//! or CI build identifiers (`0.0.641-pr241`). Manifest ids need a single
//! integer, and update checks compare build run numbers rather than semver.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DATE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));

static RUN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:-[A-Za-z0-9.]+)?$").expect("valid run number regex"));

/// Normalize a version string into its integer form, as a string
///
/// Dots are dropped from dotted versions and dates are packed as `YYYYMMDD`.
/// Anything without digits normalizes to `"0"`.
pub fn extract_manifest_version(version: &str) -> String {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Some(caps) = DATE_VERSION.captures(trimmed) {
        return format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
    }

    // Suffixes such as "-beta" or "+build" are not part of the number
    let head = trimmed
        .split(|c: char| c == '-' || c == '+' || c.is_whitespace())
        .next()
        .unwrap_or("");

    let digits: String = head.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits.to_string()
    }
}

/// Integer form of [`extract_manifest_version`]; 0 when it does not fit
pub fn manifest_version_number(version: &str) -> u32 {
    let normalized = extract_manifest_version(version);
    normalized.parse().unwrap_or_else(|_| {
        debug!("Version '{}' normalizes to '{}' which does not fit a u32", version, normalized);
        0
    })
}

/// Build run number of a version string (`0.0.641-pr241` -> 641)
pub fn extract_run_number(version: &str) -> u64 {
    let trimmed = version.trim();
    if let Some(caps) = RUN_NUMBER.captures(trimmed) {
        if let Ok(run) = caps[1].parse() {
            return run;
        }
    }
    trimmed.parse().unwrap_or(0)
}

/// Whether `candidate` carries a higher run number than `current`
pub fn is_newer_version(current: &str, candidate: &str) -> bool {
    extract_run_number(candidate) > extract_run_number(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_manifest_version() {
        assert_eq!(extract_manifest_version("1.04"), "104");
        assert_eq!(extract_manifest_version("2025-11-07"), "20251107");
        assert_eq!(extract_manifest_version(""), "0");
        assert_eq!(extract_manifest_version("v1.08"), "108");
        assert_eq!(extract_manifest_version("1.0-beta"), "10");
        assert_eq!(extract_manifest_version("latest"), "0");
    }

    #[test]
    fn test_manifest_version_number() {
        assert_eq!(manifest_version_number("1.04"), 104);
        assert_eq!(manifest_version_number("2025-11-07"), 20251107);
        assert_eq!(manifest_version_number("9999999999999"), 0);
    }

    #[test]
    fn test_extract_run_number() {
        assert_eq!(extract_run_number("0.0.641-pr241"), 641);
        assert_eq!(extract_run_number("0.0.640"), 640);
        assert_eq!(extract_run_number("42"), 42);
        assert_eq!(extract_run_number("nightly"), 0);
    }

    #[test]
    fn test_run_number_comparison() {
        assert!(is_newer_version("0.0.640-pr241", "0.0.641-pr241"));
        assert!(!is_newer_version("0.0.641-pr241", "0.0.641-pr241"));
        assert!(!is_newer_version("0.0.641-pr241", "0.0.640-pr300"));
    }
}
