//! Shared-memory execution: every worker reads the same input buffer and
//! writes its own disjoint slices of one output buffer.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use log::debug;
use ps_core::{BorderMode, Error, ImageRows, Kernel, PixelBuffer};
use rayon::prelude::*;

use crate::partition::Region;
use crate::stencil::apply_region;

/// The output rows of one region, borrowed mutably from the shared buffer.
#[derive(Debug)]
pub(crate) struct RegionTarget<'a> {
    pub(crate) rank: usize,
    pub(crate) region: Region,
    pub(crate) rows: Vec<&'a mut [u16]>,
}

/// Splits `samples` into one set of row segments per region.
///
/// Regions must be pairwise disjoint and lie inside the image; the borrow
/// checker then guarantees no two workers can write the same sample.
pub(crate) fn split_targets<'a>(
    samples: &'a mut [u16],
    width: usize,
    channels: usize,
    regions: &[Region],
) -> Vec<RegionTarget<'a>> {
    let mut targets: Vec<RegionTarget<'a>> = regions
        .iter()
        .enumerate()
        .map(|(rank, &region)| RegionTarget {
            rank,
            region,
            rows: Vec::with_capacity(region.height()),
        })
        .collect();

    let stride = width * channels;
    if stride == 0 {
        return targets;
    }

    let mut by_x: Vec<usize> = (0..regions.len()).collect();
    by_x.sort_by_key(|&i| regions[i].x0);

    for (y, row) in samples.chunks_mut(stride).enumerate() {
        let mut rest = row;
        let mut consumed = 0;
        for &i in &by_x {
            let region = regions[i];
            if !region.rows().contains(&y) {
                continue;
            }
            assert!(region.x0 >= consumed, "regions overlap on row {y}");

            let tail = std::mem::take(&mut rest);
            let (_, tail) = tail.split_at_mut((region.x0 - consumed) * channels);
            let (segment, tail) = tail.split_at_mut(region.width() * channels);
            targets[i].rows.push(segment);
            rest = tail;
            consumed = region.x1;
        }
    }

    targets
}

fn fill_target(
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max: u16,
    target: RegionTarget<'_>,
) {
    apply_region(src, kernel, border, max, target.region, target.rows);
}

/// Runs every region on the calling thread.
pub(crate) fn run_sequential(
    input: &PixelBuffer,
    kernel: &Kernel,
    border: BorderMode,
    regions: &[Region],
) -> PixelBuffer {
    let mut out = input.zeroed_like();
    let src = input.as_rows();
    let max = input.max_value();
    let (width, channels) = (input.width(), input.channels());

    for target in split_targets(out.samples_mut(), width, channels, regions) {
        fill_target(&src, kernel, border, max, target);
    }
    out
}

/// One scoped OS thread per region, joined before returning.
pub(crate) fn run_threads(
    input: &PixelBuffer,
    kernel: &Kernel,
    border: BorderMode,
    regions: &[Region],
) -> Result<PixelBuffer, Error> {
    let mut out = input.zeroed_like();
    let src = input.as_rows();
    let max = input.max_value();
    let (width, channels) = (input.width(), input.channels());
    let targets = split_targets(out.samples_mut(), width, channels, regions);
    fill_on_threads(&src, kernel, border, max, targets)?;
    Ok(out)
}

fn fill_on_threads(
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max: u16,
    targets: Vec<RegionTarget<'_>>,
) -> Result<(), Error> {
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let rank = target.rank;
            let handle = thread::Builder::new()
                .name(format!("ps-thread-{rank}"))
                .spawn_scoped(s, move || {
                    debug!("thread {rank}: region {:?}", target.region);
                    fill_target(src, kernel, border, max, target);
                })
                .map_err(|e| Error::Spawn(e.to_string()))?;
            handles.push((rank, handle));
        }

        for (rank, handle) in handles {
            handle.join().map_err(|_| Error::WorkerPanicked { rank })?;
        }
        Ok(())
    })
}

/// Regions dispatched onto a dedicated rayon pool of `workers` threads.
pub(crate) fn run_rayon(
    input: &PixelBuffer,
    kernel: &Kernel,
    border: BorderMode,
    regions: &[Region],
    workers: usize,
) -> Result<PixelBuffer, Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ps-rayon-{i}"))
        .build()
        .map_err(|e| Error::Spawn(e.to_string()))?;

    let mut out = input.zeroed_like();
    let src = input.as_rows();
    let max = input.max_value();
    let (width, channels) = (input.width(), input.channels());
    let targets = split_targets(out.samples_mut(), width, channels, regions);
    fill_on_pool(&pool, &src, kernel, border, max, targets)?;
    Ok(out)
}

/// A panicking region is reported as [`Error::WorkerPanicked`], as with
/// plain threads, instead of unwinding through the pool.
fn fill_on_pool(
    pool: &rayon::ThreadPool,
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max: u16,
    targets: Vec<RegionTarget<'_>>,
) -> Result<(), Error> {
    pool.install(|| {
        targets.into_par_iter().try_for_each(|target| {
            let rank = target.rank;
            panic::catch_unwind(AssertUnwindSafe(|| {
                fill_target(src, kernel, border, max, target)
            }))
            .map_err(|_| Error::WorkerPanicked { rank })
        })
    })
}

#[cfg(test)]
mod tests {
    use ps_core::{BorderMode, Error, Filter, PixelBuffer, PixelFormat};

    use super::{RegionTarget, fill_on_pool, fill_on_threads, split_targets};
    use crate::partition::{Region, quadrants, row_bands};

    /// Rank 1's output row is one sample short, so evaluating it panics.
    fn targets_with_short_row(buf: &mut [u16]) -> Vec<RegionTarget<'_>> {
        let (first, second) = buf.split_at_mut(2);
        vec![
            RegionTarget {
                rank: 0,
                region: Region::row_band(0, 1, 2),
                rows: vec![first],
            },
            RegionTarget {
                rank: 1,
                region: Region::row_band(1, 2, 2),
                rows: vec![second],
            },
        ]
    }

    #[test]
    fn panicking_region_is_reported_by_rank_on_threads_and_pool() {
        let img =
            PixelBuffer::from_vec(PixelFormat::Gray, 2, 2, 255, vec![1, 2, 3, 4]).expect("valid");
        let kernel = Filter::Blur.kernel();
        let src = img.as_rows();

        let mut buf = vec![0u16; 3];
        let targets = targets_with_short_row(&mut buf);
        let err = fill_on_threads(&src, &kernel, BorderMode::Skip, 255, targets)
            .expect_err("short row on threads");
        assert_eq!(err, Error::WorkerPanicked { rank: 1 });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .expect("pool");
        let mut buf = vec![0u16; 3];
        let targets = targets_with_short_row(&mut buf);
        let err = fill_on_pool(&pool, &src, &kernel, BorderMode::Skip, 255, targets)
            .expect_err("short row on pool");
        assert_eq!(err, Error::WorkerPanicked { rank: 1 });
    }

    #[test]
    fn quadrant_targets_are_disjoint_row_segments() {
        let (w, h, ch) = (5, 3, 3);
        let mut samples = vec![0u16; w * h * ch];
        let regions = quadrants(w, h);

        {
            let targets = split_targets(&mut samples, w, ch, &regions);
            assert_eq!(targets.len(), 4);
            for t in targets {
                assert_eq!(t.rows.len(), t.region.height());
                for row in t.rows {
                    assert_eq!(row.len(), t.region.width() * ch);
                    for v in row.iter_mut() {
                        *v += 1 + t.rank as u16;
                    }
                }
            }
        }

        for y in 0..h {
            for x in 0..w {
                let rank = regions
                    .iter()
                    .position(|r| r.contains(x, y))
                    .expect("covered");
                for c in 0..ch {
                    assert_eq!(samples[(y * w + x) * ch + c], 1 + rank as u16);
                }
            }
        }
    }

    #[test]
    fn band_targets_follow_region_order() {
        let mut samples: Vec<u16> = (0..12).collect();
        let regions = row_bands(2, 6, 4);
        let targets = split_targets(&mut samples, 2, 1, &regions);

        let firsts: Vec<u16> = targets.iter().map(|t| t.rows[0][0]).collect();
        assert_eq!(firsts, vec![0, 4, 8, 10]);
        assert_eq!(targets[0].region, Region::row_band(0, 2, 2));
    }

    #[test]
    #[should_panic(expected = "regions overlap")]
    fn overlapping_regions_are_rejected() {
        let mut samples = vec![0u16; 16];
        let regions = [Region::new(0, 0, 3, 2), Region::new(2, 0, 4, 2)];
        let _ = split_targets(&mut samples, 4, 1, &regions);
    }
}
