//! Distributed construction of k-d trees over a group of MPI workers.
pub mod constants;
pub mod distributed;
pub mod error;
pub mod helpers;
pub mod serial;
pub mod serialize;
pub mod topology;
pub mod transport;
pub mod types;
