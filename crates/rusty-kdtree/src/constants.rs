//! Crate wide constants
use mpi::topology::Rank;

use crate::types::point::Coordinate;

/// Reserved coordinate marking an absent node in a serialized tree. Never valid input.
pub const EMPTY_PLACEHOLDER: Coordinate = Coordinate::MIN;

/// Rank that owns the input points and receives the assembled tree.
pub const COORDINATOR: Rank = 0;
