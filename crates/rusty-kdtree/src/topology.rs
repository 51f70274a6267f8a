//! Mapping of worker ranks onto levels of the tree.
//!
//! Every worker evaluates these functions on its own and reaches the same
//! answer, so no negotiation is needed to decide who sends data to whom. The
//! first `2^max_depth` ranks double the number of busy workers at each level up
//! to `max_depth`. The remaining surplus ranks take over one branch each at level
//! `max_depth + 1`.

use mpi::topology::Rank;

use crate::{
    constants::COORDINATOR,
    error::{BuildError, Result},
};

/// floor(log2(n)), 0 for a single worker.
pub fn max_depth(n_processes: Rank) -> usize {
    if n_processes <= 1 {
        0
    } else {
        (Rank::BITS - 1 - n_processes.leading_zeros()) as usize
    }
}

/// Workers beyond the largest power of two not exceeding `n_processes`.
pub fn surplus(n_processes: Rank, max_depth: usize) -> Rank {
    n_processes - (1 << max_depth)
}

/// Role of a worker when the build moves down to the next level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exchange {
    /// Hand the upper partition to this rank and later receive its subtree back.
    Send(Rank),
    /// Receive a partition from this rank and later return the subtree built from it.
    Receive(Rank),
}

impl Exchange {
    pub fn partner(&self) -> Rank {
        match *self {
            Exchange::Send(rank) | Exchange::Receive(rank) => rank,
        }
    }
}

/// Role of `rank` when moving into `next_depth`, or `None` if it takes no part in
/// an exchange at that level.
pub fn exchange(
    rank: Rank,
    next_depth: usize,
    max_depth: usize,
    surplus: Rank,
    n_processes: Rank,
) -> Option<Exchange> {
    if next_depth == 0 {
        return None;
    }

    if next_depth <= max_depth {
        let half: Rank = 1 << (next_depth - 1);
        if rank < half {
            Some(Exchange::Send(rank + half))
        } else if rank < 2 * half {
            Some(Exchange::Receive(rank - half))
        } else {
            None
        }
    } else if next_depth == max_depth + 1 {
        let first_surplus = n_processes - surplus;
        if rank < surplus {
            Some(Exchange::Send(first_surplus + rank))
        } else if rank >= first_surplus {
            Some(Exchange::Receive(rank - first_surplus))
        } else {
            None
        }
    } else {
        None
    }
}

/// Rank that `rank` exchanges data with when moving from `depth` to `next_depth`.
pub fn partner(
    rank: Rank,
    depth: usize,
    next_depth: usize,
    max_depth: usize,
    surplus: Rank,
    n_processes: Rank,
) -> Option<Rank> {
    debug_assert_eq!(depth + 1, next_depth);
    exchange(rank, next_depth, max_depth, surplus, n_processes).map(|e| e.partner())
}

/// The parallel layout of one worker in a group of `n_processes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessTopology {
    rank: Rank,
    n_processes: Rank,
    max_depth: usize,
    surplus: Rank,
}

impl ProcessTopology {
    pub fn new(rank: Rank, n_processes: Rank) -> Result<ProcessTopology> {
        if n_processes < 1 {
            return Err(BuildError::Topology {
                rank,
                reason: format!("a group needs at least one worker, got {n_processes}"),
            });
        }
        if rank < 0 || rank >= n_processes {
            return Err(BuildError::Topology {
                rank,
                reason: format!("rank outside of a group of {n_processes} workers"),
            });
        }

        let max_depth = max_depth(n_processes);
        Ok(ProcessTopology {
            rank,
            n_processes,
            max_depth,
            surplus: surplus(n_processes, max_depth),
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn n_processes(&self) -> Rank {
        self.n_processes
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn surplus(&self) -> Rank {
        self.surplus
    }

    /// This worker's role when the build moves into `next_depth`.
    pub fn exchange(&self, next_depth: usize) -> Option<Exchange> {
        exchange(
            self.rank,
            next_depth,
            self.max_depth,
            self.surplus,
            self.n_processes,
        )
    }

    /// The rank this worker receives its points from, and the depth of the subtree
    /// it builds with them. `None` for the coordinator.
    pub fn parent(&self) -> Option<(Rank, usize)> {
        if self.rank == COORDINATOR {
            return None;
        }
        (1..=self.max_depth + 1).find_map(|depth| match self.exchange(depth) {
            Some(Exchange::Receive(parent)) => Some((parent, depth)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_depth_and_surplus() {
        let expected = [(1, 0, 0), (2, 1, 0), (3, 1, 1), (4, 2, 0), (5, 2, 1), (7, 2, 3), (8, 3, 0)];
        for &(n, depth, extra) in expected.iter() {
            assert_eq!(max_depth(n), depth);
            assert_eq!(surplus(n, depth), extra);
        }
    }

    /// Exchanges at each level form a perfect matching between senders and receivers.
    #[test]
    fn test_exchanges_match() {
        for n in 1..=64 {
            let depth = max_depth(n);
            let extra = surplus(n, depth);

            for next_depth in 0..=depth + 3 {
                for rank in 0..n {
                    match exchange(rank, next_depth, depth, extra, n) {
                        Some(Exchange::Send(to)) => {
                            assert_ne!(to, rank);
                            assert!(to < n);
                            assert_eq!(
                                exchange(to, next_depth, depth, extra, n),
                                Some(Exchange::Receive(rank))
                            );
                        }
                        Some(Exchange::Receive(from)) => {
                            assert_ne!(from, rank);
                            assert_eq!(
                                exchange(from, next_depth, depth, extra, n),
                                Some(Exchange::Send(rank))
                            );
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Every worker but the coordinator receives exactly once, and only sends
    /// at deeper levels afterwards.
    #[test]
    fn test_every_worker_has_one_parent() {
        for n in 1..=64 {
            let depth = max_depth(n);
            for rank in 0..n {
                let topology = ProcessTopology::new(rank, n).unwrap();
                let receives: Vec<usize> = (0..=depth + 2)
                    .filter(|&d| matches!(topology.exchange(d), Some(Exchange::Receive(_))))
                    .collect();

                if rank == COORDINATOR {
                    assert!(receives.is_empty());
                    assert_eq!(topology.parent(), None);
                } else {
                    assert_eq!(receives.len(), 1);
                    let (_, entry) = topology.parent().unwrap();
                    assert_eq!(entry, receives[0]);
                    for d in 0..entry {
                        assert_eq!(topology.exchange(d), None);
                    }
                }
            }
        }
    }

    #[test]
    fn test_surplus_folded_into_last_level() {
        // Five workers: two parallel levels, one surplus rank.
        let n = 5;
        let depth = max_depth(n);
        let extra = surplus(n, depth);
        assert_eq!((depth, extra), (2, 1));
        assert_eq!(ProcessTopology::new(0, n).unwrap().surplus(), extra);

        assert_eq!(partner(0, 0, 1, depth, extra, n), Some(1));
        assert_eq!(partner(0, 1, 2, depth, extra, n), Some(2));
        assert_eq!(partner(1, 1, 2, depth, extra, n), Some(3));
        assert_eq!(partner(0, 2, 3, depth, extra, n), Some(4));
        assert_eq!(partner(4, 2, 3, depth, extra, n), Some(0));
        assert_eq!(partner(1, 2, 3, depth, extra, n), None);
        assert_eq!(partner(0, 3, 4, depth, extra, n), None);

        let topology = ProcessTopology::new(4, n).unwrap();
        assert_eq!(topology.parent(), Some((0, 3)));
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let topology = ProcessTopology::new(0, 1).unwrap();
        assert_eq!(topology.max_depth(), 0);
        assert_eq!(topology.exchange(1), None);
        assert_eq!(topology.parent(), None);
    }

    #[test]
    fn test_invalid_group() {
        assert!(ProcessTopology::new(0, 0).is_err());
        assert!(ProcessTopology::new(3, 3).is_err());
        assert!(ProcessTopology::new(-1, 3).is_err());
    }
}
