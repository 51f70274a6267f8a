//! Addressed, synchronous point to point messaging between the workers of a group.
//!
//! Every send blocks until the matching receive has been posted, and vice versa.
//! Variable sized buffers travel as a count followed by the payload, so the
//! receiving side can size its buffer before the data arrives.

use mpi::{topology::Rank, traits::*};

use crate::{
    error::{BuildError, Result},
    types::point::Coordinate,
};

pub trait Transport {
    fn rank(&self) -> Rank;

    fn size(&self) -> Rank;

    fn send_count(&self, destination: Rank, count: u64) -> Result<()>;

    fn send_coordinates(&self, destination: Rank, data: &[Coordinate]) -> Result<()>;

    fn receive_count(&self, source: Rank) -> Result<u64>;

    /// Receive exactly `len` coordinates from `source`.
    fn receive_coordinates(&self, source: Rank, len: usize) -> Result<Vec<Coordinate>>;

    /// Send `data` as a count of `dims` sized groups followed by the groups.
    fn send_groups(&self, destination: Rank, data: &[Coordinate], dims: usize) -> Result<()> {
        let count = (data.len() / dims) as u64;
        self.send_count(destination, count)?;
        self.send_coordinates(destination, data)
    }

    fn receive_groups(&self, source: Rank, dims: usize) -> Result<Vec<Coordinate>> {
        let count = self.receive_count(source)?;
        let len = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(dims))
            .ok_or_else(|| BuildError::Transfer {
                rank: self.rank(),
                peer: source,
                reason: format!("announced count {count} does not fit in memory"),
            })?;
        self.receive_coordinates(source, len)
    }
}

/// Messaging over an MPI communicator, with synchronous mode sends.
pub struct MpiTransport<'a, C: Communicator> {
    comm: &'a C,
}

impl<'a, C: Communicator> MpiTransport<'a, C> {
    pub fn new(comm: &'a C) -> MpiTransport<'a, C> {
        MpiTransport { comm }
    }
}

impl<'a, C: Communicator> Transport for MpiTransport<'a, C> {
    fn rank(&self) -> Rank {
        self.comm.rank()
    }

    fn size(&self) -> Rank {
        self.comm.size()
    }

    fn send_count(&self, destination: Rank, count: u64) -> Result<()> {
        self.comm
            .process_at_rank(destination)
            .synchronous_send(&count);
        Ok(())
    }

    fn send_coordinates(&self, destination: Rank, data: &[Coordinate]) -> Result<()> {
        self.comm
            .process_at_rank(destination)
            .synchronous_send(data);
        Ok(())
    }

    fn receive_count(&self, source: Rank) -> Result<u64> {
        let mut count: u64 = 0;
        self.comm
            .process_at_rank(source)
            .receive_into(&mut count);
        Ok(count)
    }

    fn receive_coordinates(&self, source: Rank, len: usize) -> Result<Vec<Coordinate>> {
        let mut buffer = vec![0 as Coordinate; len];
        let status = self
            .comm
            .process_at_rank(source)
            .receive_into(&mut buffer[..]);

        let received = status.count(Coordinate::equivalent_datatype());
        if received as usize != len {
            return Err(BuildError::Transfer {
                rank: self.rank(),
                peer: source,
                reason: format!("expected {len} coordinates, received {received}"),
            });
        }
        Ok(buffer)
    }
}

/// A group of workers living in one process, one thread per worker.
///
/// Channels have zero capacity, so a send completes only when the peer takes
/// the message, matching the rendezvous semantics of synchronous MPI sends.
pub mod local {
    use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
    use std::thread;

    use mpi::topology::Rank;

    use super::Transport;
    use crate::{
        error::{BuildError, Result},
        types::point::Coordinate,
    };

    #[derive(Debug)]
    enum Message {
        Count(u64),
        Coordinates(Vec<Coordinate>),
    }

    pub struct LocalTransport {
        rank: Rank,
        size: Rank,
        /// Indexed by destination rank.
        outgoing: Vec<SyncSender<Message>>,
        /// Indexed by source rank.
        incoming: Vec<Receiver<Message>>,
    }

    /// Create the endpoints of a fully connected group of `size` workers.
    pub fn group(size: Rank) -> Vec<LocalTransport> {
        let n = size.max(0) as usize;

        // channels[from][to]
        let mut senders: Vec<Vec<SyncSender<Message>>> = vec![Vec::with_capacity(n); n];
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();

        for (from, outgoing) in senders.iter_mut().enumerate() {
            for to_receivers in receivers.iter_mut() {
                let (tx, rx) = sync_channel(0);
                outgoing.push(tx);
                to_receivers[from] = Some(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| LocalTransport {
                rank: rank as Rank,
                size,
                outgoing,
                incoming: incoming.into_iter().flatten().collect(),
            })
            .collect()
    }

    /// Run `work` on every worker of a group of `size`, returning the results by rank.
    pub fn run<F, R>(size: Rank, work: F) -> Vec<R>
    where
        F: Fn(LocalTransport) -> R + Sync,
        R: Send,
    {
        let work = &work;
        thread::scope(|scope| {
            let handles: Vec<_> = group(size)
                .into_iter()
                .map(|transport| scope.spawn(move || work(transport)))
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    impl LocalTransport {
        fn disconnected(&self, peer: Rank) -> BuildError {
            BuildError::Transfer {
                rank: self.rank,
                peer,
                reason: "peer left the group".to_string(),
            }
        }

        fn outgoing(&self, peer: Rank) -> Result<&SyncSender<Message>> {
            usize::try_from(peer)
                .ok()
                .and_then(|p| self.outgoing.get(p))
                .ok_or_else(|| self.unknown(peer))
        }

        fn incoming(&self, peer: Rank) -> Result<&Receiver<Message>> {
            usize::try_from(peer)
                .ok()
                .and_then(|p| self.incoming.get(p))
                .ok_or_else(|| self.unknown(peer))
        }

        fn unknown(&self, peer: Rank) -> BuildError {
            BuildError::Topology {
                rank: self.rank,
                reason: format!("rank {peer} is not part of a group of {}", self.size),
            }
        }

        fn send(&self, destination: Rank, message: Message) -> Result<()> {
            self.outgoing(destination)?
                .send(message)
                .map_err(|_| self.disconnected(destination))
        }

        fn receive(&self, source: Rank) -> Result<Message> {
            self.incoming(source)?
                .recv()
                .map_err(|_| self.disconnected(source))
        }

        fn unexpected(&self, source: Rank, message: &Message) -> BuildError {
            BuildError::Transfer {
                rank: self.rank,
                peer: source,
                reason: format!("unexpected message {message:?}"),
            }
        }
    }

    impl Transport for LocalTransport {
        fn rank(&self) -> Rank {
            self.rank
        }

        fn size(&self) -> Rank {
            self.size
        }

        fn send_count(&self, destination: Rank, count: u64) -> Result<()> {
            self.send(destination, Message::Count(count))
        }

        fn send_coordinates(&self, destination: Rank, data: &[Coordinate]) -> Result<()> {
            self.send(destination, Message::Coordinates(data.to_vec()))
        }

        fn receive_count(&self, source: Rank) -> Result<u64> {
            match self.receive(source)? {
                Message::Count(count) => Ok(count),
                other => Err(self.unexpected(source, &other)),
            }
        }

        fn receive_coordinates(&self, source: Rank, len: usize) -> Result<Vec<Coordinate>> {
            match self.receive(source)? {
                Message::Coordinates(data) if data.len() == len => Ok(data),
                Message::Coordinates(data) => Err(BuildError::Transfer {
                    rank: self.rank,
                    peer: source,
                    reason: format!("expected {len} coordinates, received {}", data.len()),
                }),
                other => Err(self.unexpected(source, &other)),
            }
        }
    }

}
