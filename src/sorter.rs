//! Distributed Count Sort Orchestrator
//!
//! Sequences one run end to end. Every worker moves through the same phases
//! in lock-step at the collective boundaries:
//!
//! 1. **Configuring** - validate the run and derive the partition plan;
//!    invalid configurations terminate the run before any communication
//! 2. **Distributing** - scatter the input sequence into per-worker portions
//! 3. **LocalCounting** - count the device prefix and the host suffix of the
//!    portion concurrently, then merge the two partial histograms
//! 4. **Reducing** - collectively sum all local histograms at the coordinator
//! 5. **PositionComputing** (coordinator) - prefix-sum the global histogram
//!    into cumulative boundaries
//! 6. **Reconstructing** (coordinator) - rewrite the output sequence from the
//!    boundaries
//! 7. **Verifying** (coordinator) - scan the output for sortedness
//!
//! Every step is a one-shot deterministic computation. There are no retries
//! and no partial-failure recovery: a failed allocation or a disconnected
//! worker aborts the whole run, because an incomplete distributed sort has no
//! well-defined result.

use crate::comm::{Endpoint, ProcessGroup};
use crate::device::DeviceCounter;
use crate::histogram::Histogram;
use crate::partition::PartitionPlan;
use std::thread;
use std::time::{Duration, Instant};

/// Acquires one device counter per worker, sized for the given device cut.
pub type DeviceFactory = dyn Fn(usize) -> Result<Box<dyn DeviceCounter>, String>;

/// Configuration for one distributed sort run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    /// Total number of elements to sort.
    pub size: usize,
    /// Number of cooperating workers.
    pub workers: usize,
    /// Percentage of each worker's portion handled by the device (0-100).
    pub device_pct: u32,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct SortReport {
    /// The reconstructed global sequence.
    pub output: Vec<u16>,
    /// Verification verdict. A mismatch indicates an implementation bug, not
    /// a runtime error; the run still completes and reports it.
    pub sorted: bool,
    /// Time from the pre-scatter barrier to the end of reconstruction.
    pub compute_time: Duration,
}

/// Synthesize the input sequence: `value[i] = (size - i) & 65535`, a
/// descending pattern that wraps across the key domain.
pub fn generate_input(size: usize) -> Vec<u16> {
    (0..size).map(|i| ((size - i) & 0xFFFF) as u16).collect()
}

/// Check if a slice is sorted in ascending order.
#[inline]
pub fn is_sorted(data: &[u16]) -> bool {
    data.windows(2).all(|w| w[0] <= w[1])
}

/// Run one distributed counting sort.
///
/// Workers run as threads joined before this returns. When `device_pct > 0`
/// a device counter is acquired for every worker up front via `device`;
/// acquisition failure is fatal and nothing is spawned. With `device_pct == 0`
/// no device resources are touched at all.
pub fn run(config: &SortConfig, device: Option<&DeviceFactory>) -> Result<SortReport, String> {
    let plan = PartitionPlan::new(config.size, config.workers, config.device_pct)?;

    let mut counters: Vec<Option<Box<dyn DeviceCounter>>> = Vec::with_capacity(config.workers);
    if config.device_pct > 0 {
        let factory = device
            .ok_or_else(|| "device offload requested but no device backend is available".to_string())?;
        for _ in 0..config.workers {
            counters.push(Some(factory(plan.device_cut)?));
        }
    } else {
        counters.resize_with(config.workers, || None);
    }

    let mut endpoints = ProcessGroup::create(config.workers)?;
    let coordinator = endpoints.remove(0);
    let coordinator_counter = counters.remove(0);
    let size = config.size;

    thread::scope(|scope| {
        let handles: Vec<_> = endpoints
            .into_iter()
            .zip(counters)
            .map(|(endpoint, counter)| scope.spawn(move || member_body(endpoint, plan, counter)))
            .collect();

        let report = coordinator_body(coordinator, size, plan, coordinator_counter);

        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err("a worker thread panicked".to_string()),
            }
        }

        report
    })
}

fn coordinator_body(
    endpoint: Endpoint,
    size: usize,
    plan: PartitionPlan,
    counter: Option<Box<dyn DeviceCounter>>,
) -> Result<SortReport, String> {
    let mut global = generate_input(size);

    endpoint.barrier();
    let start = Instant::now();

    let portion = endpoint.scatter(Some(&global))?;
    let local = local_count(&portion, plan, counter)?;
    let merged = endpoint
        .reduce(local)?
        .ok_or_else(|| "reduce did not deliver the merged histogram at the coordinator".to_string())?;

    let boundaries = merged.into_boundaries();
    boundaries.reconstruct(&mut global)?;

    let compute_time = start.elapsed();
    let sorted = is_sorted(&global);

    Ok(SortReport {
        output: global,
        sorted,
        compute_time,
    })
}

fn member_body(
    endpoint: Endpoint,
    plan: PartitionPlan,
    counter: Option<Box<dyn DeviceCounter>>,
) -> Result<(), String> {
    endpoint.barrier();

    let portion = endpoint.scatter(None)?;
    let local = local_count(&portion, plan, counter)?;
    endpoint.reduce(local)?;

    Ok(())
}

/// Count one worker's portion: the device prefix and the host suffix run
/// concurrently on disjoint sub-ranges, each into its own accumulator, and
/// the partials are merged only after both complete.
fn local_count(
    portion: &[u16],
    plan: PartitionPlan,
    mut counter: Option<Box<dyn DeviceCounter>>,
) -> Result<Histogram, String> {
    let (device_partial, host_partial) = rayon::join(
        || {
            counter
                .as_mut()
                .map(|c| c.count(portion, plan.device_cut))
                .transpose()
        },
        || {
            let mut host = Histogram::new();
            host.count_range(portion, plan.device_cut, plan.portion);
            host
        },
    );

    let mut local = host_partial;
    if let Some(partial) = device_partial? {
        local.merge(&partial);
    }

    Ok(local)
}
