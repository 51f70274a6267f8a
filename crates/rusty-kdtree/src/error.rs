//! Error types for tree construction.

use mpi::topology::Rank;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Topology inconsistency at rank {rank}: {reason}")]
    Topology { rank: Rank, reason: String },

    #[error("Transfer between rank {rank} and rank {peer} failed: {reason}")]
    Transfer {
        rank: Rank,
        peer: Rank,
        reason: String,
    },

    #[error("Malformed serialized tree: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;
