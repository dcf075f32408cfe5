use core::ops::Range;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Gray,
    Rgb,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Gray => "grayscale",
            Self::Rgb => "rgb",
        }
    }

    /// Plain-text PNM magic number.
    pub fn magic(self) -> &'static str {
        match self {
            Self::Gray => "P2",
            Self::Rgb => "P3",
        }
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P2" | "grayscale" | "gray" => Ok(Self::Gray),
            "P3" | "rgb" => Ok(Self::Rgb),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

/// Owned, row-major, channel-interleaved image samples.
///
/// Sample `(x, y, c)` lives at `(y * width + x) * channels + c` and is never
/// above `max_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    format: PixelFormat,
    width: usize,
    height: usize,
    max_value: u16,
    samples: Vec<u16>,
}

impl PixelBuffer {
    pub fn from_vec(
        format: PixelFormat,
        width: usize,
        height: usize,
        max_value: u16,
        samples: Vec<u16>,
    ) -> Result<Self, Error> {
        if max_value == 0 {
            return Err(Error::InvalidMaxValue);
        }

        let expected = sample_count(format, width, height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: samples.len(),
        })?;
        if samples.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: samples.len(),
            });
        }

        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| **v > max_value)
        {
            return Err(Error::SampleOutOfRange {
                index,
                value,
                max: max_value,
            });
        }

        Ok(Self {
            format,
            width,
            height,
            max_value,
            samples,
        })
    }

    /// Buffer with every sample set to `value`, validated like [`Self::from_vec`].
    pub fn new_fill(
        format: PixelFormat,
        width: usize,
        height: usize,
        max_value: u16,
        value: u16,
    ) -> Result<Self, Error> {
        let len = sample_count(format, width, height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: 0,
        })?;
        Self::from_vec(format, width, height, max_value, vec![value; len])
    }

    /// Allocates an all-zero buffer with the same geometry and ceiling.
    pub fn zeroed_like(&self) -> Self {
        Self {
            format: self.format,
            width: self.width,
            height: self.height,
            max_value: self.max_value,
            samples: vec![0; self.samples.len()],
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn max_value(&self) -> u16 {
        self.max_value
    }

    /// Samples per image row.
    pub fn row_stride(&self) -> usize {
        self.width * self.channels()
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Mutable access to the raw samples. Writers must keep every sample at
    /// or below `max_value`.
    pub fn samples_mut(&mut self) -> &mut [u16] {
        &mut self.samples
    }

    pub fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels() + c
    }

    pub fn get(&self, x: usize, y: usize, c: usize) -> Option<u16> {
        if x >= self.width || y >= self.height || c >= self.channels() {
            return None;
        }
        self.samples.get(self.index(x, y, c)).copied()
    }

    /// Samples of rows `rows.start..rows.end`.
    pub fn rows(&self, rows: Range<usize>) -> &[u16] {
        assert!(
            rows.start <= rows.end && rows.end <= self.height,
            "row range out of bounds"
        );
        let stride = self.row_stride();
        &self.samples[rows.start * stride..rows.end * stride]
    }

    pub fn as_rows(&self) -> ImageRows<'_> {
        ImageRows {
            width: self.width,
            height: self.height,
            channels: self.channels(),
            first_row: 0,
            samples: &self.samples,
        }
    }

    /// Read-only window over `rows` with full-image coordinates preserved.
    pub fn rows_view(&self, rows: Range<usize>) -> ImageRows<'_> {
        let first_row = rows.start;
        ImageRows {
            width: self.width,
            height: self.height,
            channels: self.channels(),
            first_row,
            samples: self.rows(rows),
        }
    }
}

fn sample_count(format: PixelFormat, width: usize, height: usize) -> Option<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(format.channels()))
}

/// A window of whole rows from an image whose full geometry is known.
///
/// Coordinates passed to accessors are full-image coordinates. The window
/// is what a worker can see locally: its own rows plus any halo.
#[derive(Debug, Clone, Copy)]
pub struct ImageRows<'a> {
    width: usize,
    height: usize,
    channels: usize,
    first_row: usize,
    samples: &'a [u16],
}

impl<'a> ImageRows<'a> {
    pub fn from_slice(
        width: usize,
        height: usize,
        channels: usize,
        first_row: usize,
        samples: &'a [u16],
    ) -> Result<Self, Error> {
        let stride = width.checked_mul(channels).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: samples.len(),
        })?;

        let rows = if stride == 0 { 0 } else { samples.len() / stride };
        if stride != 0 && samples.len() % stride != 0 {
            return Err(Error::SizeMismatch {
                expected: (rows + 1) * stride,
                actual: samples.len(),
            });
        }
        if first_row + rows > height {
            return Err(Error::SizeMismatch {
                expected: (height - first_row.min(height)) * stride,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            first_row,
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn row_stride(&self) -> usize {
        self.width * self.channels
    }

    /// Full-image rows covered by this window.
    pub fn window(&self) -> Range<usize> {
        let stride = self.row_stride();
        let rows = if stride == 0 { 0 } else { self.samples.len() / stride };
        self.first_row..self.first_row + rows
    }

    /// Row `y` in full-image coordinates.
    ///
    /// Panics if `y` is outside the window.
    pub fn row(&self, y: usize) -> &'a [u16] {
        let window = self.window();
        assert!(
            window.contains(&y),
            "row {y} outside visible window {window:?}"
        );
        let stride = self.row_stride();
        let start = (y - self.first_row) * stride;
        &self.samples[start..start + stride]
    }

    /// Sample at full-image coordinates, `None` outside the image.
    ///
    /// Panics when the coordinate is inside the image but its row is not
    /// part of the window.
    pub fn get(&self, x: usize, y: usize, c: usize) -> Option<u16> {
        if x >= self.width || y >= self.height || c >= self.channels {
            return None;
        }
        Some(self.row(y)[x * self.channels + c])
    }
}
