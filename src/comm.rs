//! Collective Communication Layer
//!
//! Workers exchange data at exactly two synchronization points: the scatter
//! of the input sequence into per-worker portions, and the reduction of local
//! histograms into one global histogram. Both are collective operations that
//! block each caller until every participant has reached the same point;
//! there is no fine-grained shared state between workers.
//!
//! The group is realized as one [`Endpoint`] per rank. Rank 0 is the
//! coordinator: it is the only rank that supplies scatter input and the only
//! rank that receives the reduced result. Dropping an endpoint mid-run
//! disconnects the group, which surfaces as an error on the blocked peers
//! rather than a hang.

use crate::histogram::Histogram;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{Arc, Barrier};

/// Rank of the coordinating worker.
pub const COORDINATOR_RANK: usize = 0;

/// One worker's handle into the process group.
pub struct Endpoint {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    role: Role,
}

enum Role {
    Coordinator {
        scatter_tx: Vec<Sender<Vec<u16>>>,
        reduce_rx: Receiver<Histogram>,
    },
    Member {
        scatter_rx: Receiver<Vec<u16>>,
        reduce_tx: Sender<Histogram>,
    },
}

/// Factory for a group of connected endpoints.
pub struct ProcessGroup;

impl ProcessGroup {
    /// Create `size` connected endpoints, returned in rank order.
    ///
    /// The endpoint at index 0 is the coordinator. All endpoints must stay
    /// alive for the duration of the run; collective calls on survivors fail
    /// once any endpoint is dropped early.
    pub fn create(size: usize) -> Result<Vec<Endpoint>, String> {
        if size < 1 {
            return Err("invalid input: process group needs at least one worker".to_string());
        }

        let barrier = Arc::new(Barrier::new(size));
        let (reduce_tx, reduce_rx) = unbounded();

        let mut scatter_tx = Vec::with_capacity(size - 1);
        let mut members = Vec::with_capacity(size - 1);

        for rank in 1..size {
            // One portion in flight per member is all scatter ever needs.
            let (portion_tx, portion_rx) = bounded(1);
            scatter_tx.push(portion_tx);
            members.push(Endpoint {
                rank,
                size,
                barrier: Arc::clone(&barrier),
                role: Role::Member {
                    scatter_rx: portion_rx,
                    reduce_tx: reduce_tx.clone(),
                },
            });
        }

        // The coordinator keeps no sender of its own; the reduce channel
        // disconnects exactly when every member is gone.
        drop(reduce_tx);

        let coordinator = Endpoint {
            rank: COORDINATOR_RANK,
            size,
            barrier,
            role: Role::Coordinator {
                scatter_tx,
                reduce_rx,
            },
        };

        let mut endpoints = Vec::with_capacity(size);
        endpoints.push(coordinator);
        endpoints.extend(members);
        Ok(endpoints)
    }
}

impl Endpoint {
    /// This worker's rank in `[0, size)`.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this endpoint holds distribution authority.
    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR_RANK
    }

    /// Block until every worker in the group has reached this call.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Scatter the input sequence into equal contiguous chunks, one per
    /// worker in rank order, and return this worker's portion.
    ///
    /// The coordinator must supply `input` with a length divisible by the
    /// group size; members must pass `None` and block until their chunk
    /// arrives.
    pub fn scatter(&self, input: Option<&[u16]>) -> Result<Vec<u16>, String> {
        match &self.role {
            Role::Coordinator { scatter_tx, .. } => {
                let input = input
                    .ok_or_else(|| "scatter requires the input sequence at the coordinator".to_string())?;
                if input.len() % self.size != 0 {
                    return Err(format!(
                        "cannot scatter {} elements evenly across {} worker(s)",
                        input.len(),
                        self.size
                    ));
                }

                let chunk = input.len() / self.size;
                for (peer, tx) in scatter_tx.iter().enumerate() {
                    let rank = peer + 1;
                    let portion = input[rank * chunk..(rank + 1) * chunk].to_vec();
                    tx.send(portion)
                        .map_err(|_| "process group disconnected during scatter".to_string())?;
                }

                Ok(input[..chunk].to_vec())
            }
            Role::Member { scatter_rx, .. } => {
                if input.is_some() {
                    return Err("only the coordinator supplies scatter input".to_string());
                }
                scatter_rx
                    .recv()
                    .map_err(|_| "process group disconnected during scatter".to_string())
            }
        }
    }

    /// Collectively sum every worker's local histogram.
    ///
    /// Returns `Some(merged)` at the coordinator once all contributions have
    /// arrived, `None` at every other rank. Summation order across workers is
    /// irrelevant since bucket addition is commutative.
    pub fn reduce(&self, local: Histogram) -> Result<Option<Histogram>, String> {
        match &self.role {
            Role::Coordinator { reduce_rx, .. } => {
                let mut merged = local;
                for _ in 1..self.size {
                    let contribution = reduce_rx
                        .recv()
                        .map_err(|_| "process group disconnected during reduce".to_string())?;
                    merged.merge(&contribution);
                }
                Ok(Some(merged))
            }
            Role::Member { reduce_tx, .. } => {
                reduce_tx
                    .send(local)
                    .map_err(|_| "process group disconnected during reduce".to_string())?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_group_needs_a_worker() {
        assert!(ProcessGroup::create(0).is_err());
    }

    #[test]
    fn test_single_worker_group() {
        let mut endpoints = ProcessGroup::create(1).unwrap();
        let endpoint = endpoints.remove(0);
        assert!(endpoint.is_coordinator());

        let data = vec![4u16, 3, 2, 1];
        let portion = endpoint.scatter(Some(&data)).unwrap();
        assert_eq!(portion, data);

        let mut local = Histogram::new();
        local.count_range(&portion, 0, portion.len());
        let merged = endpoint.reduce(local).unwrap().unwrap();
        assert_eq!(merged.total(), 4);
    }

    #[test]
    fn test_scatter_delivers_chunks_in_rank_order() {
        let mut endpoints = ProcessGroup::create(4).unwrap();
        let coordinator = endpoints.remove(0);

        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                thread::spawn(move || {
                    let portion = endpoint.scatter(None).unwrap();
                    // Input below holds each rank twice, in rank order.
                    assert_eq!(portion, vec![endpoint.rank() as u16; 2]);

                    let mut local = Histogram::new();
                    local.count_range(&portion, 0, portion.len());
                    assert!(endpoint.reduce(local).unwrap().is_none());
                })
            })
            .collect();

        let data = vec![0u16, 0, 1, 1, 2, 2, 3, 3];
        let portion = coordinator.scatter(Some(&data)).unwrap();
        assert_eq!(portion, vec![0, 0]);

        let mut local = Histogram::new();
        local.count_range(&portion, 0, portion.len());
        let merged = coordinator.reduce(local).unwrap().unwrap();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(merged.total(), data.len() as u64);
        for key in 0..4u16 {
            assert_eq!(merged.count_of(key), 2);
        }
    }

    #[test]
    fn test_scatter_rejects_uneven_input() {
        let mut endpoints = ProcessGroup::create(2).unwrap();
        let coordinator = endpoints.remove(0);
        let data = vec![1u16, 2, 3];
        assert!(coordinator.scatter(Some(&data)).is_err());
    }

    #[test]
    fn test_member_rejects_scatter_input() {
        let mut endpoints = ProcessGroup::create(2).unwrap();
        let member = endpoints.remove(1);
        let data = vec![1u16, 2];
        assert!(member.scatter(Some(&data)).is_err());
    }

    #[test]
    fn test_reduce_fails_when_member_dropped() {
        let mut endpoints = ProcessGroup::create(2).unwrap();
        let coordinator = endpoints.remove(0);
        drop(endpoints); // the member never contributes

        let local = Histogram::new();
        assert!(coordinator.reduce(local).is_err());
    }
}
