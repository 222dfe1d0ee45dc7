use std::sync::{Arc, Barrier, Mutex};

/// Coordinating rank: sole owner of the authoritative state, the random
/// stream, and every reduction result.
pub const ROOT: usize = 0;

/// Collective communication within a fixed group of cooperating participants.
///
/// Every method is a blocking collective: all members of the group must call
/// it, in the same relative order, or the group deadlocks. There is no
/// timeout and no detection of a stalled participant.
pub trait Communicator {
    /// Rank of this participant within the group, in [0, size).
    fn rank(&self) -> usize;

    /// Number of participants in the group.
    fn size(&self) -> usize;

    /// Broadcast `buf` from `root` to every participant.
    ///
    /// All buffers must have the same length on every rank.
    fn broadcast(&self, buf: &mut [f64], root: usize);

    /// Broadcast a single index from `root` to every participant.
    fn broadcast_index(&self, value: &mut usize, root: usize);

    /// Sum `value` across all participants.
    ///
    /// The sum is delivered to `root`; every other rank receives 0.0, mirroring
    /// an MPI Reduce whose receive buffer is only meaningful at the root.
    fn reduce_sum(&self, value: f64, root: usize) -> f64;
}

/// Trivial single-member group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&self, _buf: &mut [f64], _root: usize) {}

    fn broadcast_index(&self, _value: &mut usize, _root: usize) {}

    fn reduce_sum(&self, value: f64, _root: usize) -> f64 {
        value
    }
}

struct Shared {
    barrier: Barrier,
    slot: Mutex<Vec<f64>>,
    index_slot: Mutex<usize>,
    partials: Mutex<Vec<f64>>,
}

/// One member's handle into an in-process SPMD group.
///
/// The group advances through rendezvous collectives: the root publishes into
/// a shared slot, a barrier releases the readers, and a second barrier keeps
/// the slot from being reused before every reader has drained it.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

/// A fixed-size group of [`ThreadComm`] handles, one per participant.
pub struct CommGroup;

impl CommGroup {
    /// Create handles for a group of `size` participants.
    ///
    /// Each handle must be moved to its own thread; the collectives block
    /// until all `size` handles have joined the call.
    pub fn new(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "communicator group must have at least one member");
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slot: Mutex::new(Vec::new()),
            index_slot: Mutex::new(0),
            partials: Mutex::new(vec![0.0; size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) {
        if self.size == 1 {
            return;
        }
        if self.rank == root {
            let mut slot = self.shared.slot.lock().unwrap();
            slot.clear();
            slot.extend_from_slice(buf);
        }
        self.shared.barrier.wait();
        if self.rank != root {
            let slot = self.shared.slot.lock().unwrap();
            buf.copy_from_slice(&slot);
        }
        self.shared.barrier.wait();
    }

    fn broadcast_index(&self, value: &mut usize, root: usize) {
        if self.size == 1 {
            return;
        }
        if self.rank == root {
            *self.shared.index_slot.lock().unwrap() = *value;
        }
        self.shared.barrier.wait();
        if self.rank != root {
            *value = *self.shared.index_slot.lock().unwrap();
        }
        self.shared.barrier.wait();
    }

    fn reduce_sum(&self, value: f64, root: usize) -> f64 {
        if self.size == 1 {
            return value;
        }
        self.shared.partials.lock().unwrap()[self.rank] = value;
        self.shared.barrier.wait();
        let sum = if self.rank == root {
            self.shared.partials.lock().unwrap().iter().sum()
        } else {
            0.0
        };
        self.shared.barrier.wait();
        sum
    }
}
