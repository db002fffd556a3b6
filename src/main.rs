//! Distributed Count Sort CLI
//!
//! Sorts a synthesized sequence of `u16` keys with a distributed counting
//! sort, optionally offloading part of each worker's portion to the GPU.
//!
//! Usage: `count_sort number_of_elements device_percentage`
//!
//! The worker count comes from the process-group bootstrap, not the command
//! line: set `COUNT_SORT_WORKERS` to override the default of one worker per
//! available CPU. The element count must divide evenly across the workers.

use hybrid_count_sort::device::{DeviceCounter, MetalCounter};
use hybrid_count_sort::partition::PartitionPlan;
use hybrid_count_sort::sorter::{self, DeviceFactory, SortConfig};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} number_of_elements device_percentage", args[0]);
        process::exit(1);
    }

    let size: usize = match args[1].parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("usage: {} number_of_elements device_percentage", args[0]);
            process::exit(1);
        }
    };

    let device_pct: u32 = match args[2].parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("usage: {} number_of_elements device_percentage", args[0]);
            process::exit(1);
        }
    };

    let workers = match worker_count() {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    // Every worker could reach the same verdict on its own; failing here
    // keeps the whole run from starting.
    let plan = match PartitionPlan::new(size, workers, device_pct) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    println!("CountSort [threads][metal]\n");
    println!("sorting {} values with {} worker(s)", size, workers);
    println!("each worker receives {} values", plan.portion);
    println!(
        "the device will handle {}% of the workload ({} values)\n",
        device_pct, plan.device_cut
    );

    let config = SortConfig {
        size,
        workers,
        device_pct,
    };

    let factory = |device_cut: usize| -> Result<Box<dyn DeviceCounter>, String> {
        let counter = MetalCounter::new(device_cut)?;
        Ok(Box::new(counter))
    };
    let factory_ref: &DeviceFactory = &factory;

    let result = if device_pct > 0 {
        sorter::run(&config, Some(factory_ref))
    } else {
        sorter::run(&config, None)
    };

    match result {
        Ok(report) => {
            println!("compute time was {:.4}s", report.compute_time.as_secs_f64());
            println!("{}", if report.sorted { "sorted" } else { "NOT sorted" });
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Worker count from the environment, defaulting to available parallelism.
fn worker_count() -> Result<usize, String> {
    if let Ok(raw) = env::var("COUNT_SORT_WORKERS") {
        return raw
            .parse::<usize>()
            .map_err(|_| format!("invalid COUNT_SORT_WORKERS value: {}", raw));
    }

    Ok(std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1))
}
