//! Isolated-memory execution.
//!
//! A coordinator owns the input image. Workers run on their own threads but
//! share nothing with it: every payload is an owned message moved across a
//! channel. The protocol runs as a strict pipeline:
//!
//! 1. the coordinator broadcasts a [`JobHeader`] (geometry, ceiling, kernel,
//!    border, worker count) to every rank;
//! 2. each rank derives its row band from the header with the same
//!    partitioner the coordinator uses, and receives a [`RowSlice`] holding
//!    either its rows plus a `radius` halo or the whole image;
//! 3. each rank computes its band into a private buffer;
//! 4. the coordinator gathers every [`PartialResult`] by rank.
//!
//! Coordinator-to-worker channels are rendezvous channels, so a broadcast or
//! scatter only completes once every rank has taken its message. Any failure
//! aborts the whole job; no partial output is returned.

use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, warn};
use ps_core::{BorderMode, Error, ImageRows, Kernel, PixelBuffer, PixelFormat};
use serde::{Deserialize, Serialize};

use crate::assemble::{PartialResult, RowAssembler};
use crate::partition::{Region, row_bands};
use crate::stencil::apply_region;

/// How input rows reach the workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Each rank gets its own rows plus `radius` rows above and below.
    #[default]
    Halo,
    /// Every rank gets the whole image.
    Broadcast,
    /// Broadcast when the image holds fewer than `broadcast_below` samples,
    /// halo otherwise.
    Auto { broadcast_below: usize },
}

impl Distribution {
    fn broadcasts(self, sample_count: usize) -> bool {
        match self {
            Self::Halo => false,
            Self::Broadcast => true,
            Self::Auto { broadcast_below } => sample_count < broadcast_below,
        }
    }
}

/// Everything a rank needs to size its buffers and run the stencil.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHeader {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub max_value: u16,
    pub workers: usize,
    pub kernel: Kernel,
    pub border: BorderMode,
}

impl JobHeader {
    /// The band rank `rank` owns, as both sides compute it.
    pub fn region(&self, rank: usize) -> Option<Region> {
        row_bands(self.width, self.height, self.workers)
            .get(rank)
            .copied()
    }
}

/// Whole input rows `first_row..first_row + rows`, owned by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSlice {
    pub first_row: usize,
    pub samples: Vec<u16>,
}

#[derive(Debug)]
pub enum ToWorker {
    Header(JobHeader),
    Rows(RowSlice),
}

type Outcome = (usize, Result<PartialResult, Error>);

fn distribution_err(rank: usize, reason: impl Into<String>) -> Error {
    Error::Distribution {
        rank,
        reason: reason.into(),
    }
}

/// Runs the full coordinator side of the protocol and returns the assembled
/// image.
pub fn run_isolated(
    input: &PixelBuffer,
    kernel: &Kernel,
    border: BorderMode,
    workers: usize,
    distribution: Distribution,
) -> Result<PixelBuffer, Error> {
    if workers == 0 {
        return Err(Error::ZeroWorkers);
    }

    let header = JobHeader {
        format: input.format(),
        width: input.width(),
        height: input.height(),
        max_value: input.max_value(),
        workers,
        kernel: kernel.clone(),
        border,
    };
    let regions = row_bands(header.width, header.height, workers);
    if regions.is_empty() {
        return Ok(input.zeroed_like());
    }
    let ranks = regions.len();

    let (result_tx, result_rx) = unbounded::<Outcome>();
    let mut inboxes = Vec::with_capacity(ranks);
    let mut handles = Vec::with_capacity(ranks);
    for rank in 0..ranks {
        let (tx, rx) = bounded::<ToWorker>(0);
        let outbox = result_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("ps-rank-{rank}"))
            .spawn(move || {
                let outcome = run_worker(rank, &rx);
                if let Err(e) = &outcome {
                    warn!("rank {rank} failed: {e}");
                }
                // The coordinator may already have aborted.
                let _ = outbox.send((rank, outcome));
            });
        match spawned {
            Ok(handle) => {
                inboxes.push(tx);
                handles.push(handle);
            }
            Err(e) => {
                drop(inboxes);
                join_all(handles);
                return Err(Error::Spawn(e.to_string()));
            }
        }
    }
    drop(result_tx);

    let result = coordinate(input, &header, &regions, distribution, &inboxes, &result_rx);

    // Hanging up unblocks any rank still waiting on a message.
    drop(inboxes);
    join_all(handles);
    result
}

fn coordinate(
    input: &PixelBuffer,
    header: &JobHeader,
    regions: &[Region],
    distribution: Distribution,
    inboxes: &[Sender<ToWorker>],
    results: &Receiver<Outcome>,
) -> Result<PixelBuffer, Error> {
    for (rank, inbox) in inboxes.iter().enumerate() {
        inbox
            .send(ToWorker::Header(header.clone()))
            .map_err(|_| distribution_err(rank, "rank hung up before header broadcast"))?;
    }

    let broadcast = distribution.broadcasts(input.samples().len());
    let radius = header.kernel.radius();
    debug!(
        "isolated: {} ranks, {} distribution, radius {radius}",
        regions.len(),
        if broadcast { "broadcast" } else { "halo" }
    );

    for ((rank, inbox), region) in inboxes.iter().enumerate().zip(regions) {
        let rows = if broadcast {
            0..header.height
        } else {
            region.halo_rows(radius, header.height)
        };
        let slice = RowSlice {
            first_row: rows.start,
            samples: input.rows(rows).to_vec(),
        };
        inbox
            .send(ToWorker::Rows(slice))
            .map_err(|_| distribution_err(rank, "rank hung up before row scatter"))?;
    }

    let mut assembler = RowAssembler::new(input.zeroed_like(), regions.to_vec());
    for _ in 0..regions.len() {
        // Every rank has hung up; report the first one that never delivered.
        let Ok((rank, outcome)) = results.recv() else {
            return assembler.finish();
        };
        let partial = outcome?;
        if partial.rank != rank {
            return Err(Error::Gather {
                rank,
                reason: format!("partial labelled as rank {}", partial.rank),
            });
        }
        assembler.accept(partial)?;
    }
    assembler.finish()
}

fn join_all(handles: Vec<thread::JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

/// Worker side of the protocol: header, then rows, then compute.
pub fn run_worker(rank: usize, inbox: &Receiver<ToWorker>) -> Result<PartialResult, Error> {
    let header = match inbox.recv() {
        Ok(ToWorker::Header(h)) => h,
        Ok(ToWorker::Rows(_)) => return Err(distribution_err(rank, "rows arrived before header")),
        Err(_) => return Err(distribution_err(rank, "coordinator hung up before header")),
    };
    let slice = match inbox.recv() {
        Ok(ToWorker::Rows(s)) => s,
        Ok(ToWorker::Header(_)) => return Err(distribution_err(rank, "header received twice")),
        Err(_) => return Err(distribution_err(rank, "coordinator hung up before rows")),
    };

    let region = header
        .region(rank)
        .ok_or_else(|| distribution_err(rank, "rank has no assigned rows"))?;
    let channels = header.format.channels();

    let local = ImageRows::from_slice(
        header.width,
        header.height,
        channels,
        slice.first_row,
        &slice.samples,
    )
    .map_err(|e| distribution_err(rank, format!("malformed row slice: {e}")))?;

    let needed = region.halo_rows(header.kernel.radius(), header.height);
    let window = local.window();
    if needed.start < window.start || needed.end > window.end {
        return Err(distribution_err(
            rank,
            format!("received rows {window:?}, need {needed:?}"),
        ));
    }
    debug!("rank {rank}: rows {:?} from window {window:?}", region.rows());

    let span = region.width() * channels;
    let mut samples = vec![0u16; region.height() * span];
    apply_region(
        &local,
        &header.kernel,
        header.border,
        header.max_value,
        region,
        samples.chunks_exact_mut(span),
    );

    Ok(PartialResult {
        rank,
        region,
        samples,
    })
}
