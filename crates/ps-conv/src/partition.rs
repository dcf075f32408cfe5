//! Static work partitioning.
//!
//! Regions produced for one job are pairwise disjoint, non-empty, and tile
//! the image exactly. Partitioning is computed once up front; there is no
//! work stealing.

use core::ops::Range;

use ps_core::Error;
use serde::{Deserialize, Serialize};

/// Half-open rectangle `[x0, x1) x [y0, y1)` of output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        debug_assert!(x0 <= x1 && y0 <= y1, "inverted region");
        Self { x0, y0, x1, y1 }
    }

    /// Full-width band of rows `y0..y1`.
    pub fn row_band(y0: usize, y1: usize, width: usize) -> Self {
        Self::new(0, y0, width, y1)
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn rows(&self) -> Range<usize> {
        self.y0..self.y1
    }

    pub fn cols(&self) -> Range<usize> {
        self.x0..self.x1
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.cols().contains(&x) && self.rows().contains(&y)
    }

    /// Input rows needed to evaluate this region with a kernel of `radius`:
    /// the region's rows plus up to `radius` rows above and below.
    pub fn halo_rows(&self, radius: usize, image_height: usize) -> Range<usize> {
        self.y0.saturating_sub(radius)..(self.y1 + radius).min(image_height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Horizontal strips, one per worker.
    #[default]
    RowBands,
    /// Four tiles split at `(width / 2, height / 2)`, regardless of the
    /// requested worker count.
    Quadrants,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::RowBands => "row-bands",
            Self::Quadrants => "quadrants",
        }
    }
}

pub fn partition(
    width: usize,
    height: usize,
    workers: usize,
    strategy: Strategy,
) -> Result<Vec<Region>, Error> {
    if workers == 0 {
        return Err(Error::ZeroWorkers);
    }
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    Ok(match strategy {
        Strategy::RowBands => row_bands(width, height, workers),
        Strategy::Quadrants => quadrants(width, height),
    })
}

/// Splits `height` rows into `min(workers, height)` bands. The first
/// `height % bands` bands get one extra row.
pub fn row_bands(width: usize, height: usize, workers: usize) -> Vec<Region> {
    if width == 0 {
        return Vec::new();
    }
    even_ranges(height, workers)
        .into_iter()
        .map(|r| Region::row_band(r.start, r.end, width))
        .collect()
}

/// Splits at the integer midpoints. The last row and column belong to the
/// after-midpoint quadrants; quadrants that would be empty are omitted.
pub fn quadrants(width: usize, height: usize) -> Vec<Region> {
    let mx = width / 2;
    let my = height / 2;

    [
        Region::new(0, 0, mx, my),
        Region::new(mx, 0, width, my),
        Region::new(0, my, mx, height),
        Region::new(mx, my, width, height),
    ]
    .into_iter()
    .filter(|r| !r.is_empty())
    .collect()
}

/// Splits `0..len` into at most `parts` contiguous non-empty ranges whose
/// lengths differ by at most one.
pub fn even_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.min(len);
    if parts == 0 {
        return Vec::new();
    }

    let base = len / parts;
    let remainder = len % parts;

    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < remainder);
        out.push(start..start + size);
        start += size;
    }
    debug_assert_eq!(start, len);
    out
}
