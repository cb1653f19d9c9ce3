//! Closure record files.
//!
//! One closure per line: `candidate query m00 m01 .. m33`, the 16 entries of
//! the relative transform in row-major order, space separated.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::warn;
use nalgebra::Matrix4;

use crate::core::pose::from_matrix;
use crate::error::{Error, Result};
use crate::pipeline::ClosureRecord;

/// Fields per line.
const FIELDS: usize = 2 + 16;

/// Render closure records.
pub fn to_string(closures: &[ClosureRecord]) -> String {
    let mut out = String::new();
    for c in closures {
        let m = c.relative_matrix();
        let _ = write!(out, "{} {}", c.candidate_id, c.query_id);
        for r in 0..4 {
            for col in 0..4 {
                let _ = write!(out, " {}", m[(r, col)]);
            }
        }
        out.push('\n');
    }
    out
}

/// Write closure records to `path`.
pub fn write_closures(path: &Path, closures: &[ClosureRecord]) -> Result<()> {
    fs::write(path, to_string(closures))?;
    Ok(())
}

/// Read closure records from `path`.
pub fn read_closures(path: &Path) -> Result<Vec<ClosureRecord>> {
    parse(&fs::read_to_string(path)?)
}

/// Parse closure records.
///
/// Ids may be written as floats (`1.2e+01`). Lines with the wrong number of
/// fields are skipped with a warning.
pub fn parse(text: &str) -> Result<Vec<ClosureRecord>> {
    let mut closures = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>().map_err(|_| Error::Parse {
                    line: line_no,
                    message: format!("invalid number '{}'", t),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != FIELDS {
            warn!(
                "[closures] line {}: expected {} fields, found {}; skipped",
                line_no,
                FIELDS,
                values.len()
            );
            continue;
        }

        let candidate_id = parse_id(values[0], line_no)?;
        let query_id = parse_id(values[1], line_no)?;
        let m = Matrix4::from_row_slice(&values[2..]);
        let relative = from_matrix(&m).map_err(|e| Error::Parse {
            line: line_no,
            message: e.to_string(),
        })?;
        closures.push(ClosureRecord {
            candidate_id,
            query_id,
            relative,
        });
    }
    Ok(closures)
}

fn parse_id(value: f64, line: usize) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(Error::Parse {
            line,
            message: format!("invalid scan id {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout() {
        let text = to_string(&[ClosureRecord::from_yaw(3, 60, 0.0)]);
        assert_eq!(text.lines().count(), 1);
        let tokens: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(tokens.len(), 18);
        assert_eq!(&tokens[..2], &["3", "60"]);
        let values: Vec<f64> = tokens[2..].iter().map(|t| t.parse().unwrap()).collect();
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(values[r * 4 + c], if r == c { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closures.txt");
        let records = vec![
            ClosureRecord::from_yaw(0, 55, std::f64::consts::PI),
            ClosureRecord::from_yaw(4, 70, 0.3),
        ];
        write_closures(&path, &records).unwrap();
        let read = read_closures(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].candidate_id, 4);
        assert_eq!(read[1].query_id, 70);
        assert_relative_eq!(
            read[1].relative_matrix(),
            records[1].relative_matrix(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_numpy_style_floats() {
        let mut line = String::from("1.200000000000000000e+01 7.000000000000000000e+01");
        for r in 0..4 {
            for c in 0..4 {
                line.push_str(if r == c { " 1.0e+00" } else { " 0.0e+00" });
            }
        }
        let parsed = parse(&format!("{}\n1 2 3\n", line)).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].candidate_id, 12);
        assert_eq!(parsed[0].query_id, 70);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(parse("a b\n"), Err(Error::Parse { line: 1, .. })));
        let mut line = String::from("1.5 2");
        line.push_str(&" 0".repeat(16));
        assert!(parse(&line).is_err());
    }
}
