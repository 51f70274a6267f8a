//! Assorted helper functions: logging, input fixtures and text output.

use std::path::Path;

use ftlog::{appender::FileAppender, LevelFilter, LoggerGuard};
use rand::prelude::*;
use rand::SeedableRng;

use crate::{
    constants::EMPTY_PLACEHOLDER,
    types::{
        node::{KNode, KdTree},
        point::Coordinate,
    },
};

/// Configures the logger, writing to `log_file` if given and to stderr otherwise.
///
/// # Errors
///
/// - If the logger could not be initialized.
pub fn configure_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<LoggerGuard, String> {
    let builder = ftlog::Builder::new().max_log_level(level);
    let builder = match log_file {
        Some(path) => builder.root(FileAppender::new(path)),
        None => builder,
    };
    builder.try_init().map_err(|e| e.to_string())
}

/// `npoints` points on a descending/ascending staircase: dimension `j` of point `i`
/// is `npoints + 3 - i` for even `j` and `1 + i` for odd `j`.
pub fn staircase(npoints: usize, dims: usize) -> Vec<Coordinate> {
    let top = npoints as Coordinate + 3;
    (0..npoints)
        .flat_map(|i| {
            let i = i as Coordinate;
            (0..dims).map(move |j| if j % 2 == 0 { top - i } else { 1 + i })
        })
        .collect()
}

/// `npoints` uniformly distributed points in `[-range, range)`.
pub fn random_points(npoints: usize, dims: usize, range: Coordinate, seed: u64) -> Vec<Coordinate> {
    let mut rng = StdRng::seed_from_u64(seed);
    let between = rand::distributions::Uniform::from(-range..range);
    (0..npoints * dims)
        .map(|_| between.sample(&mut rng))
        .collect()
}

/// `(x,y,...)`, or `(n/a)` for a placeholder slot.
pub fn format_group(group: &[Coordinate]) -> String {
    if group.first() == Some(&EMPTY_PLACEHOLDER) {
        return "(n/a)".to_string();
    }
    let values: Vec<String> = group.iter().map(|c| c.to_string()).collect();
    format!("({})", values.join(","))
}

fn render_node(node: &KNode, depth: usize, side: &str, out: &mut String) {
    let indent = "  ".repeat(depth);
    let split = match depth.checked_rem(node.coordinate().len()) {
        Some(axis) => format!(" @ dim {axis}"),
        None => String::new(),
    };
    out.push_str(&format!("{indent}{side}{}{split}\n", format_group(node.coordinate())));

    if node.left().is_none() && node.right().is_none() {
        return;
    }
    for (label, child) in [("L ", node.left()), ("R ", node.right())] {
        match child {
            Some(child) => render_node(child, depth + 1, label, out),
            None => out.push_str(&format!("{indent}  {label}-\n")),
        }
    }
}

/// Indented text rendering of a tree, one node per line with its split dimension.
pub fn render(tree: &KdTree) -> String {
    let mut out = String::new();
    match tree.root() {
        Some(root) => render_node(root, 0, "", &mut out),
        None => out.push_str("(empty)\n"),
    }
    out
}
