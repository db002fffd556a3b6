//! Device Offload Adapter
//!
//! Each worker may offload the counting of a prefix of its portion to an
//! accelerator. The adapter contract is deliberately narrow: construction
//! reserves device storage for the configured cut, [`DeviceCounter::count`]
//! counts key occurrences among the first `device_cut` elements of the
//! portion and returns them as a partial histogram in the same count space
//! the host engine uses, and dropping the counter releases the device
//! storage. The caller merges the partial into its host-side counts before
//! the collective reduction, so device and host never share a mutable
//! accumulator.
//!
//! The Metal implementation only compiles on macOS. On other platforms a
//! stub is provided that returns an error, and [`SoftwareCounter`] fulfills
//! the identical contract on the host CPU.

use crate::histogram::Histogram;

/// A reserved accelerator counting resource for one worker.
///
/// Implementations count with device parallelism; the result is returned by
/// value and merged by the caller, never written concurrently into shared
/// state.
pub trait DeviceCounter: Send {
    /// Count occurrences of each key among the first `device_cut` elements
    /// of `portion`.
    fn count(&mut self, portion: &[u16], device_cut: usize) -> Result<Histogram, String>;

    /// Human-readable description of the underlying device.
    fn device_name(&self) -> String;
}

#[cfg(target_os = "macos")]
mod metal_impl {
    use super::DeviceCounter;
    use crate::histogram::{Histogram, KEY_SPACE};
    use metal::*;
    use std::mem;

    /// Counting kernel: one thread per key, relaxed atomic increments into
    /// the 65536-bucket table.
    const SHADER_SOURCE: &str = r#"
#include <metal_stdlib>
using namespace metal;

kernel void count_keys(
    device const ushort *keys [[buffer(0)]],
    device atomic_uint *counts [[buffer(1)]],
    device const uint *element_count [[buffer(2)]],
    uint gid [[thread_position_in_grid]])
{
    if (gid < *element_count) {
        atomic_fetch_add_explicit(&counts[keys[gid]], 1u, memory_order_relaxed);
    }
}
"#;

    /// Accelerator-backed key counter using Metal.
    ///
    /// The key buffer is sized once for the configured device cut and reused
    /// across counting calls; both buffers live in shared storage so no blit
    /// pass is needed to read the counts back.
    pub struct MetalCounter {
        device: Device,
        command_queue: CommandQueue,
        count_pipeline: ComputePipelineState,
        keys_buffer: Buffer,
        counts_buffer: Buffer,
        capacity: usize,
    }

    impl MetalCounter {
        /// Reserve device storage for counting up to `capacity` keys.
        ///
        /// Returns an error if Metal is not available or initialization
        /// fails. The storage is released when the counter is dropped.
        pub fn new(capacity: usize) -> Result<Self, String> {
            let device = Device::system_default()
                .ok_or_else(|| "No Metal device found. Metal is only available on macOS.")?;

            let command_queue = device.new_command_queue();

            let options = CompileOptions::new();
            let library = device
                .new_library_with_source(SHADER_SOURCE, &options)
                .map_err(|e| format!("Failed to compile count shader: {}", e))?;

            let count_fn = library
                .get_function("count_keys", None)
                .map_err(|e| format!("Failed to get count_keys: {}", e))?;

            let count_pipeline = device
                .new_compute_pipeline_state_with_function(&count_fn)
                .map_err(|e| format!("Failed to create count pipeline: {}", e))?;

            let keys_bytes = (capacity * mem::size_of::<u16>()).max(1) as u64;
            let keys_buffer =
                device.new_buffer(keys_bytes, MTLResourceOptions::StorageModeShared);

            let counts_bytes = (KEY_SPACE * mem::size_of::<u32>()) as u64;
            let counts_buffer =
                device.new_buffer(counts_bytes, MTLResourceOptions::StorageModeShared);

            Ok(Self {
                device,
                command_queue,
                count_pipeline,
                keys_buffer,
                counts_buffer,
                capacity,
            })
        }
    }

    impl DeviceCounter for MetalCounter {
        fn count(&mut self, portion: &[u16], device_cut: usize) -> Result<Histogram, String> {
            if device_cut > self.capacity {
                return Err(format!(
                    "device cut {} exceeds the reserved capacity of {}",
                    device_cut, self.capacity
                ));
            }

            if device_cut > portion.len() {
                return Err(format!(
                    "device cut {} exceeds the portion length of {}",
                    device_cut,
                    portion.len()
                ));
            }

            let mut partial = Histogram::new();
            if device_cut == 0 {
                return Ok(partial);
            }

            // Stage the device slice and clear the count table.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    portion.as_ptr(),
                    self.keys_buffer.contents() as *mut u16,
                    device_cut,
                );
                std::ptr::write_bytes(
                    self.counts_buffer.contents() as *mut u8,
                    0,
                    KEY_SPACE * mem::size_of::<u32>(),
                );
            }

            let element_count = device_cut as u32;
            let element_count_buffer = self.device.new_buffer_with_data(
                &element_count as *const u32 as *const _,
                mem::size_of::<u32>() as u64,
                MTLResourceOptions::StorageModeShared,
            );

            let command_buffer = self.command_queue.new_command_buffer();
            let encoder = command_buffer.new_compute_command_encoder();

            encoder.set_compute_pipeline_state(&self.count_pipeline);
            encoder.set_buffer(0, Some(&self.keys_buffer), 0);
            encoder.set_buffer(1, Some(&self.counts_buffer), 0);
            encoder.set_buffer(2, Some(&element_count_buffer), 0);

            let tg_size = self
                .count_pipeline
                .max_total_threads_per_threadgroup()
                .min(256);
            let grid_size = MTLSize::new(device_cut as u64, 1, 1);
            let threadgroup_size = MTLSize::new(tg_size, 1, 1);

            encoder.dispatch_threads(grid_size, threadgroup_size);
            encoder.end_encoding();

            command_buffer.commit();
            command_buffer.wait_until_completed();

            let counts_ptr = self.counts_buffer.contents() as *const u32;
            for key in 0..KEY_SPACE {
                let count = unsafe { *counts_ptr.add(key) };
                if count != 0 {
                    partial.add(key as u16, count as u64);
                }
            }

            Ok(partial)
        }

        fn device_name(&self) -> String {
            self.device.name().to_string()
        }
    }
}

#[cfg(target_os = "macos")]
pub use metal_impl::MetalCounter;

/// Stub for non-macOS platforms where Metal is unavailable.
#[cfg(not(target_os = "macos"))]
pub struct MetalCounter;

#[cfg(not(target_os = "macos"))]
impl MetalCounter {
    /// Always fails: Metal is only available on macOS.
    pub fn new(_capacity: usize) -> Result<Self, String> {
        Err("Metal is not available on this platform. GPU offload requires macOS.".to_string())
    }
}

#[cfg(not(target_os = "macos"))]
impl DeviceCounter for MetalCounter {
    fn count(&mut self, _portion: &[u16], _device_cut: usize) -> Result<Histogram, String> {
        Err("Metal is not available on this platform".to_string())
    }

    fn device_name(&self) -> String {
        "Metal (unavailable)".to_string()
    }
}

/// Host-side counter fulfilling the device contract.
///
/// Useful on machines without an accelerator and as a reference
/// implementation in tests: it reserves nominal capacity, counts the device
/// prefix on the CPU and returns the partial histogram by value, exactly as
/// an accelerator implementation must.
pub struct SoftwareCounter {
    capacity: usize,
}

impl SoftwareCounter {
    /// Reserve capacity for counting up to `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl DeviceCounter for SoftwareCounter {
    fn count(&mut self, portion: &[u16], device_cut: usize) -> Result<Histogram, String> {
        if device_cut > self.capacity {
            return Err(format!(
                "device cut {} exceeds the reserved capacity of {}",
                device_cut, self.capacity
            ));
        }

        if device_cut > portion.len() {
            return Err(format!(
                "device cut {} exceeds the portion length of {}",
                device_cut,
                portion.len()
            ));
        }

        let mut partial = Histogram::new();
        partial.count_range(portion, 0, device_cut);
        Ok(partial)
    }

    fn device_name(&self) -> String {
        "software fallback".to_string()
    }
}
