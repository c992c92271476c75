//! Pattern sources: the `.thr` text format.
//!
//! A `.thr` file holds one `theta rho` pair per line. Blank lines and lines
//! starting with `#` are ignored. Lines that do not parse are skipped and
//! counted; a partially corrupt file still yields every valid coordinate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One point of the plotter path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Polar angle [rad].
    pub theta: f64,
    /// Normalised radius (0 = centre, 1 = perimeter).
    pub rho: f64,
}

impl Coordinate {
    pub const fn new(theta: f64, rho: f64) -> Self {
        Self { theta, rho }
    }
}

/// Result of parsing a pattern source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPattern {
    /// Valid coordinates in file order.
    pub coordinates: Vec<Coordinate>,
    /// Number of malformed lines that were skipped.
    pub skipped: usize,
}

/// Preview statistics for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternExtents {
    pub count: usize,
    pub theta_min: f64,
    pub theta_max: f64,
    pub rho_min: f64,
    pub rho_max: f64,
    /// Net angular travel in full turns.
    pub revolutions: f64,
}

impl PatternExtents {
    /// Compute extents; `None` for an empty pattern.
    pub fn of(coordinates: &[Coordinate]) -> Option<Self> {
        let first = coordinates.first()?;
        let last = coordinates.last()?;
        let mut ext = Self {
            count: coordinates.len(),
            theta_min: first.theta,
            theta_max: first.theta,
            rho_min: first.rho,
            rho_max: first.rho,
            revolutions: (last.theta - first.theta) / std::f64::consts::TAU,
        };
        for c in &coordinates[1..] {
            ext.theta_min = ext.theta_min.min(c.theta);
            ext.theta_max = ext.theta_max.max(c.theta);
            ext.rho_min = ext.rho_min.min(c.rho);
            ext.rho_max = ext.rho_max.max(c.rho);
        }
        Some(ext)
    }
}

fn parse_line(line: &str) -> Option<Coordinate> {
    let mut fields = line.split_whitespace();
    let theta = fields.next()?.parse::<f64>().ok()?;
    let rho = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() || !theta.is_finite() || !rho.is_finite() {
        return None;
    }
    Some(Coordinate { theta, rho })
}

/// Parse `.thr` text.
pub fn parse_thr(text: &str) -> ParsedPattern {
    let mut parsed = ParsedPattern::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(c) => parsed.coordinates.push(c),
            None => {
                debug!("Skipping malformed pattern line {}: {:?}", idx + 1, line);
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

/// Read and parse a `.thr` file.
pub fn load_thr(path: &Path) -> std::io::Result<ParsedPattern> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_thr(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_ignores_comments() {
        let parsed = parse_thr("# header\n0 0\n\n1.5708 0.5\n  3.1416\t1.0  \n");
        assert_eq!(
            parsed.coordinates,
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.5708, 0.5),
                Coordinate::new(3.1416, 1.0),
            ]
        );
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let parsed = parse_thr("0 0\nabc def\n1.0\n1 2 3\nNaN 1\n2.0 0.25\n");
        assert_eq!(
            parsed.coordinates,
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(2.0, 0.25)]
        );
        assert_eq!(parsed.skipped, 4);
    }

    #[test]
    fn extents_of_empty_pattern_is_none() {
        assert!(PatternExtents::of(&[]).is_none());
    }

    #[test]
    fn extents_track_bounds_and_turns() {
        let coords = [
            Coordinate::new(0.0, 0.5),
            Coordinate::new(-1.0, 1.0),
            Coordinate::new(std::f64::consts::TAU * 2.0, 0.0),
        ];
        let ext = PatternExtents::of(&coords).unwrap();
        assert_eq!(ext.count, 3);
        assert_eq!(ext.theta_min, -1.0);
        assert_eq!(ext.rho_min, 0.0);
        assert_eq!(ext.rho_max, 1.0);
        assert!((ext.revolutions - 2.0).abs() < 1e-12);
    }
}
