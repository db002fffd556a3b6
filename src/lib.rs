//! # hybrid-count-sort
//!
//! Distributed counting sort over the full `u16` key domain (0..=65535).
//!
//! The input sequence is scattered across a group of cooperating workers.
//! Each worker splits its portion between an accelerator device and the host
//! CPU according to a configured percentage, counts key occurrences on both
//! sides into a fixed 65536-bucket histogram, and contributes its local
//! histogram to a collective reduction. The coordinating worker turns the
//! merged histogram into cumulative position boundaries with a prefix sum and
//! rewrites the output sequence directly from those boundaries, with no
//! comparisons and no data movement beyond range writes.
//!
//! ## Modules
//!
//! - [`partition`] - validates the run configuration and derives the
//!   per-worker portion and the device/host split
//! - [`histogram`] - the fixed-domain counting engine, prefix sums and
//!   sorted-sequence reconstruction
//! - [`device`] - the accelerator offload adapter (Metal on macOS, plus a
//!   host-side software counter honoring the same contract)
//! - [`comm`] - the collective communication layer (scatter, reduce, barrier)
//! - [`sorter`] - the orchestrator tying the phases together

pub mod comm;
pub mod device;
pub mod histogram;
pub mod partition;
pub mod sorter;
