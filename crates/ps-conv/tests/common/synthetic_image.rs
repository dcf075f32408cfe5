use ps_core::{PixelBuffer, PixelFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded uniform samples in `[0, max_value]`.
pub fn noise(
    format: PixelFormat,
    width: usize,
    height: usize,
    max_value: u16,
    seed: u64,
) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = width * height * format.channels();
    let data = (0..len).map(|_| rng.gen_range(0..=max_value)).collect();
    PixelBuffer::from_vec(format, width, height, max_value, data).expect("valid noise image")
}

/// Horizontal ramp with a bright checker overlay, useful for edge kernels.
pub fn checker_ramp(width: usize, height: usize, cell: usize) -> PixelBuffer {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let ramp = (x * 200 / width.max(1)) as u16;
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            data.push(if on { ramp.saturating_add(55) } else { ramp });
        }
    }
    PixelBuffer::from_vec(PixelFormat::Gray, width, height, 255, data).expect("valid checker")
}
