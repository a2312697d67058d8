//! Path normalization and planned-vs-touched file matching.
//!
//! The same matching rule backs the implementation gate and the
//! progress percentage, so both always agree.

use std::collections::BTreeSet;

/// Normalize a path for comparison.
///
/// Expands `~` and environment variables, unifies separators to `/`,
/// and collapses `.`, `..`, repeated and trailing separators lexically.
pub fn normalize_path(path: &str) -> String {
    let expanded = shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    let unified = expanded.replace('\\', "/");

    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` at the root stays at the root
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Whether a normalized touched path satisfies a normalized planned path.
///
/// Equal paths match, and so does a touched path that ends with the planned
/// path at a separator boundary (absolute touched vs relative planned).
pub fn path_matches(planned: &str, touched: &str) -> bool {
    touched == planned
        || touched.strip_suffix(planned).is_some_and(|prefix| prefix.ends_with('/'))
}

/// Result of matching a plan's files against the files touched so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCoverage {
    /// Planned files with at least one matching touched file
    pub matched: usize,

    /// Distinct normalized planned files
    pub total: usize,
}

impl FileCoverage {
    /// Match planned paths against touched paths.
    ///
    /// Empty planned entries are ignored. Duplicates collapse after
    /// normalization on both sides.
    pub fn compute<P, T>(planned: P, touched: T) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let planned: BTreeSet<String> = planned
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        let touched: BTreeSet<String> =
            touched.into_iter().map(|t| normalize_path(t.as_ref())).collect();

        let matched =
            planned.iter().filter(|p| touched.iter().any(|t| path_matches(p, t))).count();

        Self { matched, total: planned.len() }
    }

    /// Whether every planned file has been touched. Vacuously true for an empty plan.
    pub fn is_complete(&self) -> bool {
        self.matched >= self.total
    }

    /// Percentage rounded to the nearest integer, as shown in gate reasons.
    pub fn percent_rounded(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.matched as f64 / self.total as f64) * 100.0).round() as u32
    }

    /// Percentage truncated and clamped to 0..=100, as stored in progress.
    pub fn percent_floor(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.matched * 100 / self.total).min(100) as u8
    }
}
