//! Ordered gather of per-worker partial outputs.
//!
//! Placement is keyed by rank, never by arrival order: partial `rank` must
//! carry exactly the region the partitioner assigned to `rank`, and its
//! samples land at that region's offsets in the full image.

use log::trace;
use ps_core::{Error, PixelBuffer};

use crate::partition::Region;

/// Samples computed by one worker for its region, rows concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult {
    pub rank: usize,
    pub region: Region,
    pub samples: Vec<u16>,
}

impl PartialResult {
    /// Offset and length of the partial's first row inside the full buffer,
    /// which for a full-width band is the whole contiguous splice.
    pub fn placement(&self, width: usize, channels: usize) -> (usize, usize) {
        let offset = (self.region.y0 * width + self.region.x0) * channels;
        (offset, self.samples.len())
    }
}

#[derive(Debug)]
pub struct RowAssembler {
    out: PixelBuffer,
    regions: Vec<Region>,
    received: Vec<bool>,
}

impl RowAssembler {
    /// `out` supplies the geometry; its samples are overwritten region by
    /// region.
    pub fn new(out: PixelBuffer, regions: Vec<Region>) -> Self {
        let received = vec![false; regions.len()];
        Self {
            out,
            regions,
            received,
        }
    }

    pub fn accept(&mut self, partial: PartialResult) -> Result<(), Error> {
        let rank = partial.rank;
        let gather_err = |reason: String| Error::Gather { rank, reason };

        let Some(&expected) = self.regions.get(rank) else {
            return Err(gather_err(format!(
                "rank out of range for {} workers",
                self.regions.len()
            )));
        };
        if self.received[rank] {
            return Err(gather_err("duplicate partial result".to_string()));
        }
        if partial.region != expected {
            return Err(gather_err(format!(
                "region {:?} does not match assigned {:?}",
                partial.region, expected
            )));
        }

        let channels = self.out.channels();
        let span = expected.width() * channels;
        if partial.samples.len() != expected.height() * span {
            return Err(gather_err(format!(
                "expected {} samples, got {}",
                expected.height() * span,
                partial.samples.len()
            )));
        }
        let max = self.out.max_value();
        if partial.samples.iter().any(|&v| v > max) {
            return Err(gather_err(format!("sample above max value {max}")));
        }

        let width = self.out.width();
        let (offset, len) = partial.placement(width, channels);
        trace!("gather rank {rank}: offset {offset}, {len} samples");

        let stride = width * channels;
        let dst = self.out.samples_mut();
        if expected.width() == width {
            dst[offset..offset + len].copy_from_slice(&partial.samples);
        } else {
            for (i, src_row) in partial.samples.chunks_exact(span).enumerate() {
                let start = offset + i * stride;
                dst[start..start + span].copy_from_slice(src_row);
            }
        }

        self.received[rank] = true;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received.iter().all(|&r| r)
    }

    pub fn finish(self) -> Result<PixelBuffer, Error> {
        if let Some(rank) = self.received.iter().position(|&r| !r) {
            return Err(Error::Gather {
                rank,
                reason: "no partial result received".to_string(),
            });
        }
        Ok(self.out)
    }
}
