//! Partition Coordinator
//!
//! Derives how the input sequence splits across workers, and how each
//! worker's portion splits between the accelerator device and the host CPU.
//!
//! The derivation is pure integer arithmetic over values every worker already
//! knows (element count, worker count, device percentage), so every worker
//! computes an identical plan without any communication.

/// The per-worker work split for one run.
///
/// Invariant: `device_cut + host_cut == portion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    /// Number of elements each worker receives.
    pub portion: usize,
    /// Number of elements (a prefix of the portion) counted on the device.
    pub device_cut: usize,
    /// Number of elements (the remaining suffix) counted on the host CPU.
    pub host_cut: usize,
}

impl PartitionPlan {
    /// Validate a run configuration and compute the work split.
    ///
    /// Rejects the configuration when the element count is zero, when it is
    /// not evenly divisible by the worker count, or when the device
    /// percentage exceeds 100. The device cut is the exact integer floor of
    /// `device_pct / 100 * portion`.
    pub fn new(size: usize, workers: usize, device_pct: u32) -> Result<Self, String> {
        if workers < 1 {
            return Err("invalid input: worker count must be at least 1".to_string());
        }

        if size < 1 {
            return Err("invalid input: element count must be at least 1".to_string());
        }

        if size % workers != 0 {
            return Err(format!(
                "invalid input: element count {} is not evenly divisible by {} worker(s)",
                size, workers
            ));
        }

        if device_pct > 100 {
            return Err(format!(
                "invalid input: device percentage must be between 0 and 100, got {}",
                device_pct
            ));
        }

        let portion = size / workers;
        let device_cut = portion * device_pct as usize / 100;
        let host_cut = portion - device_cut;

        Ok(Self {
            portion,
            device_cut,
            host_cut,
        })
    }
}
