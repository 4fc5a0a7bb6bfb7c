//! Sweep profiles and size parsing.

use crate::executor::MAX_WORKERS;
use crate::sweep::Workload;

/// Thread counts and size tiers of a named sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepProfile {
    /// Name the profile is looked up by
    pub name: &'static str,
    /// Thread counts, in the order they are measured
    pub threads: Vec<usize>,
    /// Size tiers, in the order they are measured
    pub sizes: Vec<usize>,
}

/// Names accepted by [`profile`].
pub const PROFILES: [&str; 3] = ["quick", "standard", "thorough"];

/// Smallest tier, largest tier, in that order.
pub fn default_tiers(workload: Workload) -> (usize, usize) {
    match workload {
        Workload::FullMatrix | Workload::TriangularMatrix => (10, 10_000),
        Workload::Extremes | Workload::DotProduct => (90, 9_000_000),
    }
}

/// Two tiers on 1, 2 and 4 threads.
pub fn quick_profile(workload: Workload) -> SweepProfile {
    let (base, _) = default_tiers(workload);
    SweepProfile {
        name: "quick",
        threads: vec![1, 2, 4],
        sizes: geometric_sizes(base, base * 10),
    }
}

/// Every tier but the largest on 1..=16 threads.
pub fn standard_profile(workload: Workload) -> SweepProfile {
    let (base, ceiling) = default_tiers(workload);
    SweepProfile {
        name: "standard",
        threads: (1..=16).collect(),
        sizes: geometric_sizes(base, ceiling / 10),
    }
}

/// Every tier on 1..=16 threads.
pub fn thorough_profile(workload: Workload) -> SweepProfile {
    let (base, ceiling) = default_tiers(workload);
    SweepProfile {
        name: "thorough",
        threads: (1..=16).collect(),
        sizes: geometric_sizes(base, ceiling),
    }
}

/// Lookup a profile by name.
pub fn profile(name: &str, workload: Workload) -> Option<SweepProfile> {
    match name {
        "quick" => Some(quick_profile(workload)),
        "standard" => Some(standard_profile(workload)),
        "thorough" => Some(thorough_profile(workload)),
        _ => None,
    }
}

/// Tiers growing by a factor of ten from `base` while they stay within
/// `ceiling`.
///
/// # Examples
///
/// ```
/// use sync_reductions::config::geometric_sizes;
///
/// assert_eq!(geometric_sizes(10, 10_000), vec![10, 100, 1_000, 10_000]);
/// assert_eq!(geometric_sizes(90, 1_000), vec![90, 900]);
/// ```
pub fn geometric_sizes(base: usize, ceiling: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    if base == 0 {
        return sizes;
    }

    let mut size = base;
    while size <= ceiling {
        sizes.push(size);
        size = match size.checked_mul(10) {
            Some(next) => next,
            None => break,
        };
    }
    sizes
}

/// Parse a human-readable size string to a usize.
///
/// Supports:
/// - "1M" or "1m" -> 1_000_000
/// - "9M" -> 9_000_000
/// - "10K" or "10k" -> 10_000
/// - "1_000" -> 1_000
/// - "90" -> 90
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();

    // Handle suffix multipliers
    if let Some(prefix) = s.strip_suffix('M').or_else(|| s.strip_suffix('m')) {
        return scaled(s, prefix, 1_000_000.0);
    }

    if let Some(prefix) = s.strip_suffix('K').or_else(|| s.strip_suffix('k')) {
        return scaled(s, prefix, 1_000.0);
    }

    // Raw number (possibly with underscores)
    s.replace('_', "")
        .parse::<usize>()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))
}

fn scaled(s: &str, prefix: &str, factor: f64) -> Result<usize, String> {
    let num: f64 = prefix
        .replace('_', "")
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid size '{}': must be a non-negative number", s));
    }
    Ok((num * factor) as usize)
}

/// Parse a list of size strings.
pub fn parse_sizes(raw: &[String]) -> Result<Vec<usize>, String> {
    raw.iter().map(|s| parse_size(s)).collect()
}

/// Inclusive range of thread counts, checked against [`MAX_WORKERS`].
pub fn thread_range(min: usize, max: usize) -> Result<Vec<usize>, String> {
    if min == 0 || min > max || max > MAX_WORKERS {
        return Err(format!(
            "Invalid thread range {}..={}: expected 1 <= min <= max <= {}",
            min, max, MAX_WORKERS
        ));
    }
    Ok((min..=max).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_millions() {
        assert_eq!(parse_size("1M").unwrap(), 1_000_000);
        assert_eq!(parse_size("9M").unwrap(), 9_000_000);
        assert_eq!(parse_size("1m").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_thousands() {
        assert_eq!(parse_size("1.5K").unwrap(), 1_500);
        assert_eq!(parse_size("10K").unwrap(), 10_000);
        assert_eq!(parse_size("90k").unwrap(), 90_000);
    }

    #[test]
    fn test_parse_size_raw() {
        assert_eq!(parse_size("90").unwrap(), 90);
        assert_eq!(parse_size("1_000").unwrap(), 1_000);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("-1K").is_err());
        assert!(parse_sizes(&["10".to_string(), "x".to_string()]).is_err());
    }

    #[test]
    fn test_geometric_sizes() {
        assert_eq!(geometric_sizes(90, 9_000_000).len(), 6);
        assert_eq!(*geometric_sizes(90, 9_000_000).last().unwrap(), 9_000_000);
        assert!(geometric_sizes(100, 10).is_empty());
        assert!(geometric_sizes(0, 10).is_empty());
    }

    #[test]
    fn test_profiles() {
        for &name in &PROFILES {
            let profile = profile(name, Workload::FullMatrix).unwrap();
            assert_eq!(profile.name, name);
            assert!(!profile.threads.is_empty());
            assert!(!profile.sizes.is_empty());
        }
        assert!(profile("exhaustive", Workload::FullMatrix).is_none());

        assert_eq!(
            thorough_profile(Workload::TriangularMatrix).sizes,
            vec![10, 100, 1_000, 10_000]
        );
        assert_eq!(quick_profile(Workload::DotProduct).sizes, vec![90, 900]);
        assert_eq!(standard_profile(Workload::Extremes).threads, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_thread_range() {
        assert_eq!(thread_range(1, 4).unwrap(), vec![1, 2, 3, 4]);
        assert!(thread_range(0, 4).is_err());
        assert!(thread_range(5, 4).is_err());
        assert!(thread_range(1, MAX_WORKERS + 1).is_err());
    }
}
