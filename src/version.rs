//! Dotted version comparison with build-suffix stripping
//!
//! Versions look like `10.2.0`, optionally followed by a `-<suffix>` build tag
//! (`10.2.0-RC1-mako`). The suffix never takes part in the comparison.
//!
//! At most three dot-separated components are compared. When one side still has
//! a `.` delimiter at a position where the other has none, the longer side wins
//! outright with [`GREATER`] / [`LESSER`] instead of a component difference. The
//! two sentinels are not exact negations of each other (`-LESSER != GREATER`),
//! so antisymmetry holds for every pair except the ones that hit that edge.

use crate::error::VersionParseError;

/// Result returned when the left side has more components at some position
pub const GREATER: i64 = i32::MAX as i64;

/// Result returned when the right side has more components at some position
pub const LESSER: i64 = i32::MIN as i64;

/// Number of leading components that are compared
const MAX_COMPONENTS: usize = 3;

/// Remove a `-<suffix>` tail, if any
pub fn strip_build_suffix(version: &str) -> &str {
    match version.split_once('-') {
        Some((head, _)) => head,
        None => version,
    }
}

/// Compare two version strings
///
/// Returns a negative number when `a < b`, zero when they are equal and a
/// positive number when `a > b`. The magnitude is the difference of the first
/// differing component, or one of the sentinels.
///
/// # Errors
///
/// Returns [`VersionParseError`] when a compared component is not an integer
/// (including empty components such as in `10..1`).
///
/// # Examples
///
/// ```
/// use update_stager::version::compare_versions;
///
/// assert!(compare_versions("10.1.1", "10.1.2").unwrap() < 0);
/// assert_eq!(compare_versions("10.2.0-device", "10.2.0").unwrap(), 0);
/// assert!(compare_versions("10.beta", "10.1").is_err());
/// ```
pub fn compare_versions(a: &str, b: &str) -> Result<i64, VersionParseError> {
    let a = strip_build_suffix(a);
    let b = strip_build_suffix(b);

    let mut rest_a = Some(a);
    let mut rest_b = Some(b);

    for _ in 0..MAX_COMPONENTS {
        // Both sides were consumed by a previous final token
        let (Some(left), Some(right)) = (rest_a, rest_b) else {
            return Ok(0);
        };

        let (token_a, token_b) = match (left.split_once('.'), right.split_once('.')) {
            (Some(_), None) => return Ok(GREATER),
            (None, Some(_)) => return Ok(LESSER),
            (Some((head_a, tail_a)), Some((head_b, tail_b))) => {
                rest_a = Some(tail_a);
                rest_b = Some(tail_b);
                (head_a, head_b)
            }
            (None, None) => {
                rest_a = None;
                rest_b = None;
                (left, right)
            }
        };

        let value_a = parse_component(a, token_a)?;
        let value_b = parse_component(b, token_b)?;

        if value_a != value_b {
            return Ok(i64::from(value_a) - i64::from(value_b));
        }
    }

    Ok(0)
}

fn parse_component(input: &str, component: &str) -> Result<i32, VersionParseError> {
    component.parse().map_err(|_| VersionParseError {
        input: input.to_string(),
        component: component.to_string(),
    })
}
