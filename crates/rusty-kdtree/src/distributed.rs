//! Construction of a k-d tree spread over a group of workers.
//!
//! Steps:
//! ------
//! 0) The coordinator holds all the points, every other worker waits for its share.
//! 1) While the topology pairs a worker with a partner for the next level, the
//!    worker splits its points at the median, keeps the lower half and hands the
//!    upper half to the partner.
//! 2) Once a worker is alone with its subtree it builds the rest sequentially.
//! 3) Finished subtrees are packed and sent back along the same pairs, and
//!    attached as right children until the coordinator holds the whole tree.

use mpi::topology::Rank;

use crate::{
    constants::COORDINATOR,
    error::{BuildError, Result},
    serial,
    serialize::{pack, unpack},
    topology::{Exchange, ProcessTopology},
    transport::Transport,
    types::{
        node::{KNode, KdTree},
        point::{Coordinate, PointSet},
    },
};

pub struct DistributedKdTreeBuilder<'a, T: Transport> {
    transport: &'a T,
    topology: ProcessTopology,
    dims: usize,
}

impl<'a, T: Transport> DistributedKdTreeBuilder<'a, T> {
    /// Set up a builder for this worker. Every worker of the group must use the
    /// same `dims`.
    pub fn new(transport: &'a T, dims: usize) -> Result<DistributedKdTreeBuilder<'a, T>> {
        if dims == 0 {
            return Err(BuildError::InvalidConfiguration(
                "dims must be at least 1".to_string(),
            ));
        }
        let topology = ProcessTopology::new(transport.rank(), transport.size())?;

        Ok(DistributedKdTreeBuilder {
            transport,
            topology,
            dims,
        })
    }

    fn rank(&self) -> Rank {
        self.topology.rank()
    }

    /// Build the tree over `points`, a flat buffer of `npoints * dims` coordinates.
    ///
    /// Must be called by every worker of the group. Only the coordinator passes
    /// points and gets the tree back; every other worker passes an empty buffer and
    /// gets `None` once its part of the tree has been returned.
    pub fn build(&self, points: &[Coordinate]) -> Result<Option<KdTree>> {
        if self.rank() == COORDINATOR {
            let points = PointSet::new(points.to_vec(), self.dims)?;
            ftlog::info!(
                "rank {}: building tree over {} points of {} dims with {} workers",
                self.rank(),
                points.len(),
                self.dims,
                self.topology.n_processes()
            );

            let root = self.grow(points, 0)?;
            let tree = KdTree::new(root, self.dims);
            ftlog::info!(
                "rank {}: tree complete, {} nodes, height {}",
                self.rank(),
                tree.len(),
                tree.height()
            );
            return Ok(Some(tree));
        }

        if !points.is_empty() {
            return Err(BuildError::InvalidConfiguration(format!(
                "only rank {COORDINATOR} may supply points, rank {} got {}",
                self.rank(),
                points.len()
            )));
        }

        let (parent, depth) = self.topology.parent().ok_or_else(|| BuildError::Topology {
            rank: self.rank(),
            reason: "worker has no parent to receive points from".to_string(),
        })?;

        let received = self.transport.receive_groups(parent, self.dims)?;
        let points = PointSet::new(received, self.dims)?;
        ftlog::debug!(
            "rank {}: received {} points from rank {} at depth {}",
            self.rank(),
            points.len(),
            parent,
            depth
        );

        let subtree = self.grow(points, depth)?;
        let packed = pack(subtree.as_deref(), self.dims)?;
        drop(subtree);

        self.transport.send_groups(parent, &packed, self.dims)?;
        ftlog::debug!(
            "rank {}: returned subtree of {} slots to rank {}",
            self.rank(),
            packed.len() / self.dims,
            parent
        );

        Ok(None)
    }

    /// Build the subtree rooted at `depth`, handing off work while the topology
    /// provides partners.
    fn grow(&self, points: PointSet, depth: usize) -> Result<Option<Box<KNode>>> {
        let partner = match self.topology.exchange(depth + 1) {
            None => return Ok(serial::build(points, depth)),
            Some(Exchange::Send(partner)) => partner,
            Some(Exchange::Receive(source)) => {
                return Err(BuildError::Topology {
                    rank: self.rank(),
                    reason: format!(
                        "asked to receive from rank {source} at depth {} while building",
                        depth + 1
                    ),
                })
            }
        };

        // An empty set still goes through the exchange, the partner is waiting for it.
        let (median, low, high) = match points.median_split(depth) {
            Some(split) => (Some(split.median), split.low, split.high),
            None => (None, PointSet::empty(self.dims), PointSet::empty(self.dims)),
        };

        let handed_off = high.len();
        self.transport
            .send_groups(partner, high.as_flat(), self.dims)?;
        drop(high);
        ftlog::debug!(
            "rank {}: handed {} points to rank {} at depth {}",
            self.rank(),
            handed_off,
            partner,
            depth + 1
        );

        let left = self.grow(low, depth + 1)?;

        let packed = self.transport.receive_groups(partner, self.dims)?;
        let right = unpack(&packed, self.dims)?;

        let returned = right.as_deref().map_or(0, KNode::len);
        if returned != handed_off {
            return Err(BuildError::Transfer {
                rank: self.rank(),
                peer: partner,
                reason: format!("handed off {handed_off} points, got a subtree of {returned}"),
            });
        }

        Ok(median.map(|median| Box::new(KNode::with_children(median, left, right))))
    }
}
