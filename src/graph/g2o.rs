//! g2o `SE3:QUAT` text format.
//!
//! ```text
//! VERTEX_SE3:QUAT id tx ty tz qx qy qz qw
//! EDGE_SE3:QUAT from to tx ty tz qx qy qz qw  I11 I12 .. I16 I22 .. I66
//! FIX id
//! ```
//!
//! The 21 information entries are the upper triangle of the 6×6 matrix in
//! row-major order. Lines with other tags are skipped.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::debug;
use nalgebra::Matrix6;

use crate::core::pose::{from_translation_quaternion, to_translation_quaternion};
use crate::error::{Error, Result};

use super::config::PoseGraphConfig;
use super::pose_graph::PoseGraph;

/// Vertex tag.
pub const VERTEX_TAG: &str = "VERTEX_SE3:QUAT";
/// Edge tag.
pub const EDGE_TAG: &str = "EDGE_SE3:QUAT";
/// Anchor tag.
pub const FIX_TAG: &str = "FIX";

/// Render the graph: vertices in insertion order, then edges, then
/// `FIX` lines for fixed nodes.
pub fn to_string(graph: &PoseGraph) -> String {
    let mut out = String::new();
    for node in graph.nodes() {
        let (t, q) = to_translation_quaternion(&node.pose);
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {} {} {}",
            VERTEX_TAG, node.id, t[0], t[1], t[2], q[0], q[1], q[2], q[3]
        );
    }
    for factor in graph.factors() {
        let (t, q) = to_translation_quaternion(&factor.measurement);
        let _ = write!(
            out,
            "{} {} {} {} {} {} {} {} {} {}",
            EDGE_TAG, factor.from, factor.to, t[0], t[1], t[2], q[0], q[1], q[2], q[3]
        );
        for r in 0..6 {
            for c in r..6 {
                let _ = write!(out, " {}", factor.information[(r, c)]);
            }
        }
        out.push('\n');
    }
    for node in graph.nodes().iter().filter(|n| n.fixed) {
        let _ = writeln!(out, "{} {}", FIX_TAG, node.id);
    }
    out
}

/// Write the graph to `path`.
pub fn write_file(graph: &PoseGraph, path: &Path) -> Result<()> {
    fs::write(path, to_string(graph))?;
    debug!(
        "[g2o] wrote {} vertices, {} edges to {}",
        graph.num_nodes(),
        graph.num_factors(),
        path.display()
    );
    Ok(())
}

/// Read a graph from `path`.
pub fn read_file(path: &Path, config: PoseGraphConfig) -> Result<PoseGraph> {
    let text = fs::read_to_string(path)?;
    parse(&text, config)
}

/// Parse g2o text.
///
/// Edges may precede the vertices they reference. Without `FIX` lines the
/// anchoring follows `config.fix_first_node`; with them only the listed
/// nodes are fixed.
pub fn parse(text: &str, config: PoseGraphConfig) -> Result<PoseGraph> {
    let mut vertices = Vec::new();
    let mut edges = Vec::new();
    let mut fixed = Vec::new();

    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };
        let rest: Vec<&str> = tokens.collect();
        match tag {
            VERTEX_TAG => {
                expect_fields(&rest, 8, line_no)?;
                let id = parse_id(rest[0], line_no)?;
                let v = parse_floats(&rest[1..], line_no)?;
                let pose = from_translation_quaternion([v[0], v[1], v[2]], [v[3], v[4], v[5], v[6]])
                    .map_err(|e| parse_error(line_no, e.to_string()))?;
                vertices.push((id, pose));
            }
            EDGE_TAG => {
                expect_fields(&rest, 30, line_no)?;
                let from = parse_id(rest[0], line_no)?;
                let to = parse_id(rest[1], line_no)?;
                let v = parse_floats(&rest[2..], line_no)?;
                let pose = from_translation_quaternion([v[0], v[1], v[2]], [v[3], v[4], v[5], v[6]])
                    .map_err(|e| parse_error(line_no, e.to_string()))?;
                let mut information = Matrix6::zeros();
                let mut k = 7;
                for r in 0..6 {
                    for c in r..6 {
                        information[(r, c)] = v[k];
                        information[(c, r)] = v[k];
                        k += 1;
                    }
                }
                edges.push((line_no, from, to, pose, information));
            }
            FIX_TAG => {
                if rest.is_empty() {
                    return Err(parse_error(line_no, "FIX without ids".into()));
                }
                for token in &rest {
                    fixed.push(parse_id(token, line_no)?);
                }
            }
            other => debug!("[g2o] line {}: skipping tag {}", line_no, other),
        }
    }

    let config = PoseGraphConfig {
        fix_first_node: config.fix_first_node && fixed.is_empty(),
        ..config
    };
    let mut graph = PoseGraph::new(config);
    for (id, pose) in vertices {
        graph.add_variable(id, pose)?;
    }
    for (line_no, from, to, pose, information) in edges {
        graph
            .add_factor(from, to, pose, information)
            .map_err(|e| parse_error(line_no, e.to_string()))?;
    }
    for id in fixed {
        graph.set_fixed(id, true)?;
    }
    Ok(graph)
}

fn parse_error(line: usize, message: String) -> Error {
    Error::Parse { line, message }
}

fn expect_fields(fields: &[&str], expected: usize, line: usize) -> Result<()> {
    if fields.len() != expected {
        return Err(parse_error(
            line,
            format!("expected {} fields, found {}", expected, fields.len()),
        ));
    }
    Ok(())
}

fn parse_id(token: &str, line: usize) -> Result<u64> {
    token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid id '{}'", token)))
}

fn parse_floats(tokens: &[&str], line: usize) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| parse_error(line, format!("invalid number '{}'", t)))
        })
        .collect()
}
