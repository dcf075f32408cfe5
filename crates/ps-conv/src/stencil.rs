use core::ops::Range;

use ps_core::{BorderMode, ImageRows, Kernel, map_index};

use crate::partition::Region;

/// Computes output sample `(x, y, c)`.
///
/// Taps are accumulated in `f32`, rows outer and columns inner. Taps that
/// `border` maps to nothing are left out of the sum. The sum is rounded
/// half away from zero and saturated to `[0, max_value]`.
pub fn evaluate(
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max_value: u16,
    x: usize,
    y: usize,
    c: usize,
) -> u16 {
    let r = kernel.radius() as isize;
    let w = src.width();
    let h = src.height();
    let ch = src.channels();

    let mut acc = 0.0f32;
    for ky in 0..kernel.side() {
        let Some(ny) = map_index(y as isize + ky as isize - r, h, border) else {
            continue;
        };
        let row = src.row(ny);
        for kx in 0..kernel.side() {
            let Some(nx) = map_index(x as isize + kx as isize - r, w, border) else {
                continue;
            };
            acc += row[nx * ch + c] as f32 * kernel.weight(ky, kx);
        }
    }

    quantize(acc, max_value)
}

#[inline]
pub fn quantize(sum: f32, max_value: u16) -> u16 {
    sum.round().clamp(0.0, max_value as f32) as u16
}

/// Writes row `y`, columns `cols`, into `out` (interleaved channels).
pub fn apply_span(
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max_value: u16,
    y: usize,
    cols: Range<usize>,
    out: &mut [u16],
) {
    let ch = src.channels();
    assert_eq!(
        out.len(),
        cols.len() * ch,
        "out must hold one pixel per column"
    );

    let side = kernel.side();
    let r = kernel.radius();
    let w = src.width();
    let h = src.height();

    // Resolve the contributing input rows once per output row.
    let mut taps: Vec<Option<&[u16]>> = Vec::with_capacity(side);
    for ky in 0..side {
        let ny = map_index(y as isize + ky as isize - r as isize, h, border);
        taps.push(ny.map(|ny| src.row(ny)));
    }

    let interior = r..w.saturating_sub(r);
    for (x, px) in cols.zip(out.chunks_exact_mut(ch)) {
        if interior.contains(&x) {
            span_interior(&taps, kernel, x - r, ch, max_value, px);
        } else {
            span_border(&taps, kernel, border, x, w, ch, max_value, px);
        }
    }
}

fn span_interior(
    taps: &[Option<&[u16]>],
    kernel: &Kernel,
    base_x: usize,
    ch: usize,
    max_value: u16,
    px: &mut [u16],
) {
    let side = kernel.side();
    for (c, out) in px.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (ky, row) in taps.iter().enumerate() {
            let Some(row) = row else { continue };
            let weights = &kernel.weights()[ky * side..(ky + 1) * side];
            let start = base_x * ch + c;
            for (kx, &wv) in weights.iter().enumerate() {
                acc += row[start + kx * ch] as f32 * wv;
            }
        }
        *out = quantize(acc, max_value);
    }
}

#[allow(clippy::too_many_arguments)]
fn span_border(
    taps: &[Option<&[u16]>],
    kernel: &Kernel,
    border: BorderMode,
    x: usize,
    w: usize,
    ch: usize,
    max_value: u16,
    px: &mut [u16],
) {
    let r = kernel.radius() as isize;
    for (c, out) in px.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (ky, row) in taps.iter().enumerate() {
            let Some(row) = row else { continue };
            for kx in 0..kernel.side() {
                let Some(nx) = map_index(x as isize + kx as isize - r, w, border) else {
                    continue;
                };
                acc += row[nx * ch + c] as f32 * kernel.weight(ky, kx);
            }
        }
        *out = quantize(acc, max_value);
    }
}

/// Evaluates every pixel of `region`, one output row segment per region row.
pub fn apply_region<'o>(
    src: &ImageRows<'_>,
    kernel: &Kernel,
    border: BorderMode,
    max_value: u16,
    region: Region,
    rows: impl IntoIterator<Item = &'o mut [u16]>,
) {
    let mut written = 0;
    for (y, out) in region.rows().zip(rows) {
        apply_span(src, kernel, border, max_value, y, region.cols(), out);
        written += 1;
    }
    debug_assert_eq!(written, region.height(), "missing output rows");
}
