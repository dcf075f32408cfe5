//! Example: worker scaling sweep.
//!
//! Filters one image with every backend at worker counts 1, 2, 4, ... up to
//! `--max-workers`, checks each result against the sequential output and
//! writes the timings to a JSON file.
//!
//! Input is a PNG/JPEG (converted to RGB) or a plain PNM. Without `--input`
//! a synthetic RGB gradient of `--width` x `--height` is used.
//!
//! Run from the workspace root:
//!   cargo run --release -p pixel-stencil --example compare_backends -- --help
//!   cargo run --release -p pixel-stencil --example compare_backends -- --filter sharpen

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::ImageReader;
use pixel_stencil::{
    Backend, ConvolveConfig, Filter, PixelBuffer, PixelFormat, convolve, convolve_sequential, pnm,
};
use serde::Serialize;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Time every backend across a range of worker counts")]
struct Args {
    /// Input image; omit for a synthetic gradient
    #[arg(long)]
    input: Option<String>,

    #[arg(long, default_value_t = 1920)]
    width: usize,

    #[arg(long, default_value_t = 1080)]
    height: usize,

    /// blur, laplace or sharpen
    #[arg(long, default_value = "blur")]
    filter: String,

    /// Largest worker count in the sweep
    #[arg(long, default_value_t = 16)]
    max_workers: usize,

    /// Output JSON path
    #[arg(long, default_value = "compare_backends.json")]
    out: String,
}

// ── JSON DTOs ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunDto {
    backend: &'static str,
    workers: usize,
    elapsed_ms: f64,
    /// Sequential time divided by this run's time.
    speedup: f64,
}

#[derive(Serialize)]
struct SweepResult {
    filter: &'static str,
    width: usize,
    height: usize,
    channels: usize,
    sequential_ms: f64,
    runs: Vec<RunDto>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn gradient(width: usize, height: usize) -> Result<PixelBuffer> {
    let mut samples = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            samples.push(((x * 255) / width.max(1)) as u16);
            samples.push(((y * 255) / height.max(1)) as u16);
            samples.push((((x + y) * 7) % 256) as u16);
        }
    }
    PixelBuffer::from_vec(PixelFormat::Rgb, width, height, 255, samples)
        .context("building gradient")
}

fn load(path: &str) -> Result<PixelBuffer> {
    if pnm::is_pnm_path(Path::new(path)) {
        return pnm::load(Path::new(path)).with_context(|| format!("loading {path}"));
    }
    let rgb = ImageReader::open(path)
        .with_context(|| format!("opening {path}"))?
        .decode()
        .with_context(|| format!("decoding {path}"))?
        .into_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let samples = rgb.into_raw().into_iter().map(u16::from).collect();
    PixelBuffer::from_vec(PixelFormat::Rgb, w, h, 255, samples).context("building buffer")
}

fn worker_counts(max: usize) -> Vec<usize> {
    let mut counts = Vec::new();
    let mut n = 1;
    while n < max {
        counts.push(n);
        n *= 2;
    }
    counts.push(max.max(1));
    counts
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let img = match &args.input {
        Some(path) => load(path)?,
        None => gradient(args.width, args.height)?,
    };
    let filter: Filter = args.filter.parse()?;
    let filter_name = filter.name();
    let kernel = filter.into_kernel();

    println!(
        "{} on {}x{} {} image",
        filter_name,
        img.width(),
        img.height(),
        img.format().tag()
    );

    let t0 = Instant::now();
    let reference = convolve_sequential(&img, &kernel, Default::default());
    let sequential_ms = t0.elapsed().as_secs_f64() * 1e3;
    println!("  sequential            {sequential_ms:>9.2} ms");

    let mut runs = Vec::new();
    for backend in [Backend::Threads, Backend::Rayon, Backend::Isolated] {
        for workers in worker_counts(args.max_workers) {
            let config = ConvolveConfig::with_backend(backend, workers);

            let t0 = Instant::now();
            let out = convolve(&img, &kernel, &config)?;
            let elapsed_ms = t0.elapsed().as_secs_f64() * 1e3;

            if out != reference {
                bail!("{} with {workers} workers disagrees with sequential", backend.name());
            }
            let speedup = sequential_ms / elapsed_ms.max(f64::EPSILON);
            println!(
                "  {:<9} {workers:>3} workers {elapsed_ms:>9.2} ms  x{speedup:.2}",
                backend.name()
            );
            runs.push(RunDto {
                backend: backend.name(),
                workers,
                elapsed_ms,
                speedup,
            });
        }
    }

    let result = SweepResult {
        filter: filter_name,
        width: img.width(),
        height: img.height(),
        channels: img.channels(),
        sequential_ms,
        runs,
    };
    let file = std::fs::File::create(&args.out).with_context(|| format!("creating {}", args.out))?;
    serde_json::to_writer_pretty(file, &result).context("writing JSON")?;
    println!("results written to {}", args.out);

    Ok(())
}
