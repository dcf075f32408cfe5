use std::thread;

use ps_core::Error;

use crate::partition::even_ranges;

/// Sums `values` across `workers` threads.
///
/// Each worker sums its own contiguous chunk; the partial sums are reduced
/// by the calling thread after every worker has been joined.
pub fn parallel_sum(values: &[u32], workers: usize) -> Result<u64, Error> {
    if workers == 0 {
        return Err(Error::ZeroWorkers);
    }

    let partials = thread::scope(|s| {
        let handles: Vec<_> = even_ranges(values.len(), workers)
            .into_iter()
            .map(|range| {
                let chunk = &values[range];
                s.spawn(move || chunk.iter().map(|&v| u64::from(v)).sum::<u64>())
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().map_err(|_| Error::WorkerPanicked { rank }))
            .collect::<Result<Vec<u64>, Error>>()
    })?;

    Ok(partials.into_iter().sum())
}
