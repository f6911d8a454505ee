//! Size aggregation and human-readable formatting.
//!
//! [`summarize`] runs after the walk has completed, on a single thread, and
//! never touches the filesystem.

use std::path::PathBuf;

use super::tree::Node;

// ───────────────────────────────────────── units ─────────────

/// Unit system used when rendering sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Powers of 1024: KiB, MiB, …
    #[default]
    Iec,
    /// Powers of 1000: kB, MB, …
    Si,
}

impl Units {
    fn base(self) -> u64 {
        match self {
            Units::Iec => 1024,
            Units::Si => 1000,
        }
    }

    fn symbols(self) -> &'static [&'static str] {
        match self {
            Units::Iec => &["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"],
            Units::Si => &["kB", "MB", "GB", "TB", "PB", "EB"],
        }
    }

    /// Name used in the config file.
    pub fn config_key(self) -> &'static str {
        match self {
            Units::Iec => "iec",
            Units::Si => "si",
        }
    }

    pub fn from_config_key(s: &str) -> Option<Self> {
        match s {
            "iec" => Some(Units::Iec),
            "si" => Some(Units::Si),
            _ => None,
        }
    }
}

/// Render a byte count, e.g. `"1023 B"`, `"1.5 KiB"`.
///
/// `u64::MAX` is 16 EiB, so the largest symbol always suffices; the exponent
/// is clamped anyway.
pub fn human_size(bytes: u64, units: Units) -> String {
    let base = units.base();
    if bytes < base {
        return format!("{bytes} B");
    }
    let symbols = units.symbols();
    let mut div = base;
    let mut exp = 0;
    let mut n = bytes / base;
    while n >= base && exp + 1 < symbols.len() {
        div *= base;
        exp += 1;
        n /= base;
    }
    format!("{:.1} {}", bytes as f64 / div as f64, symbols[exp])
}

// ───────────────────────────────────────── aggregation ───────

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub path: PathBuf,
    /// Cumulative size of the entry and everything beneath it.
    pub bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Post-order: every node follows its children, the root comes last.
    pub lines: Vec<ReportLine>,
    /// Cumulative size of the root.
    pub total: u64,
}

/// Compute cumulative sizes for the whole tree and collect a line for every
/// node no deeper than `max_depth` (root = 0).
///
/// A negative `max_depth` collects no lines but still computes the total.
pub fn summarize(root: &Node, max_depth: i64) -> Summary {
    let mut lines = Vec::new();
    let total = accumulate(root, max_depth, &mut lines);
    Summary { lines, total }
}

fn accumulate(node: &Node, budget: i64, lines: &mut Vec<ReportLine>) -> u64 {
    let children: u64 = node
        .children
        .iter()
        .map(|child| accumulate(child, budget.saturating_sub(1), lines))
        .fold(0, u64::saturating_add);
    let total = node.own_size().saturating_add(children);

    if budget >= 0 {
        lines.push(ReportLine {
            path: node.path().to_path_buf(),
            bytes: total,
        });
    }
    total
}
