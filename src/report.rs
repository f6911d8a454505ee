//! Plain-text rendering of a [`Summary`](crate::core::size::Summary).
//!
//! Lines look like `<path>\t<size>`, with enough tabs after each path that
//! the size column lines up on an 8-column tab stop.

use std::io::{self, Write};

use crate::core::size::{human_size, ReportLine, Units};

const TAB_WIDTH: usize = 8;

pub fn write_report<W: Write>(out: &mut W, lines: &[ReportLine], units: Units) -> io::Result<()> {
    let paths: Vec<String> = lines
        .iter()
        .map(|l| l.path.display().to_string())
        .collect();
    let widest = paths.iter().map(|p| p.chars().count()).max().unwrap_or(0);
    // First tab stop strictly past the widest path.
    let column = (widest / TAB_WIDTH + 1) * TAB_WIDTH;

    for (path, line) in paths.iter().zip(lines) {
        let width = path.chars().count();
        let tabs = (column - width).div_ceil(TAB_WIDTH);
        writeln!(
            out,
            "{path}{}{}",
            "\t".repeat(tabs),
            human_size(line.bytes, units)
        )?;
    }
    Ok(())
}
