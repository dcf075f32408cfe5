use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, info};
use ps_conv::{Backend, ConvolveConfig, Distribution, Strategy, convolve, convolve_sequential};
use ps_core::{BorderMode, Filter, Kernel, PixelBuffer, PixelFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "pixel_stencil")]
#[command(about = "Apply 3x3 stencil filters to images with parallel workers")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter one image and write the result.
    #[command(name = "filter")]
    Filter(FilterArgs),
    /// Run every backend on one image and check they agree.
    #[command(name = "compare")]
    Compare(CompareArgs),
    /// Parallel sum of random integers against a sequential sum.
    #[command(name = "sum")]
    Sum(SumArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Sequential,
    Threads,
    Rayon,
    Isolated,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Sequential => Backend::Sequential,
            BackendArg::Threads => Backend::Threads,
            BackendArg::Rayon => Backend::Rayon,
            BackendArg::Isolated => Backend::Isolated,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    RowBands,
    Quadrants,
}

impl From<StrategyArg> for Strategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::RowBands => Strategy::RowBands,
            StrategyArg::Quadrants => Strategy::Quadrants,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BorderArg {
    Skip,
    Clamp,
    Reflect101,
}

impl From<BorderArg> for BorderMode {
    fn from(v: BorderArg) -> Self {
        match v {
            BorderArg::Skip => BorderMode::Skip,
            BorderArg::Clamp => BorderMode::Clamp,
            BorderArg::Reflect101 => BorderMode::Reflect101,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DistributionArg {
    Halo,
    Broadcast,
}

#[derive(Args, Debug, Clone)]
struct KernelArgs {
    /// Named filter: blur, laplace or sharpen
    #[arg(long, default_value = "blur")]
    filter: String,
    /// JSON file holding a square, odd-sided array of weight rows; overrides --filter
    #[arg(long)]
    kernel_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct JobArgs {
    /// JSON job configuration; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, value_enum)]
    border: Option<BorderArg>,
    #[arg(long, value_enum)]
    distribution: Option<DistributionArg>,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, required = true)]
    output: PathBuf,
    #[command(flatten)]
    kernel: KernelArgs,
    #[command(flatten)]
    job: JobArgs,
    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct CompareArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[command(flatten)]
    kernel: KernelArgs,
    #[command(flatten)]
    job: JobArgs,
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct SumArgs {
    #[arg(long, default_value_t = 5_000_000)]
    len: usize,
    #[arg(long, default_value_t = 10)]
    workers: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Debug, Clone, Serialize)]
struct FilterReport {
    input: String,
    output: String,
    filter: &'static str,
    format: &'static str,
    width: usize,
    height: usize,
    max_value: u16,
    config: ConvolveConfig,
    elapsed_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
struct BackendTiming {
    backend: &'static str,
    workers: usize,
    elapsed_ms: f64,
    matches_sequential: bool,
}

#[derive(Debug, Clone, Serialize)]
struct CompareReport {
    input: String,
    filter: &'static str,
    width: usize,
    height: usize,
    channels: usize,
    runs: Vec<BackendTiming>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Filter(args) => run_filter(args),
        Command::Compare(args) => run_compare(args),
        Command::Sum(args) => run_sum(args),
    }
}

fn run_filter(args: FilterArgs) -> Result<()> {
    let filter = resolve_filter(&args.kernel)?;
    let config = resolve_config(&args.job)?;
    let img = load_image(&args.input)?;
    let filter_name = filter.name();
    let kernel = filter.into_kernel();

    let t0 = Instant::now();
    let out = convolve(&img, &kernel, &config)
        .with_context(|| format!("applying {filter_name} filter"))?;
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1e3;

    save_image(&args.output, &out)?;
    info!(
        "{} {}x{} with {} ({} workers, {}) in {elapsed_ms:.2} ms",
        filter_name,
        img.width(),
        img.height(),
        config.backend.name(),
        config.workers,
        config.strategy.name(),
    );
    println!("image written to {} ({elapsed_ms:.3} ms)", args.output.display());

    if let Some(path) = &args.report {
        write_json(
            path,
            &FilterReport {
                input: args.input.display().to_string(),
                output: args.output.display().to_string(),
                filter: filter_name,
                format: img.format().tag(),
                width: img.width(),
                height: img.height(),
                max_value: img.max_value(),
                config,
                elapsed_ms,
            },
        )?;
    }

    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let filter = resolve_filter(&args.kernel)?;
    let base = resolve_config(&args.job)?;
    let img = load_image(&args.input)?;
    let filter_name = filter.name();
    let kernel = filter.into_kernel();

    let reference = convolve_sequential(&img, &kernel, base.border);
    let mut runs = Vec::with_capacity(Backend::ALL.len());
    let mut mismatches = Vec::new();

    for backend in Backend::ALL {
        let mut config = ConvolveConfig {
            backend,
            ..base.clone()
        };
        if backend == Backend::Isolated {
            config.strategy = Strategy::RowBands;
        }

        let t0 = Instant::now();
        let out = convolve(&img, &kernel, &config)
            .with_context(|| format!("running {} backend", backend.name()))?;
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1e3;

        let matches_sequential = out == reference;
        if !matches_sequential {
            mismatches.push(backend.name());
        }
        println!(
            "  {:<10} {:>3} workers  {elapsed_ms:>9.3} ms  {}",
            backend.name(),
            config.workers,
            if matches_sequential { "ok" } else { "MISMATCH" }
        );
        runs.push(BackendTiming {
            backend: backend.name(),
            workers: config.workers,
            elapsed_ms,
            matches_sequential,
        });
    }

    if let Some(path) = &args.report {
        write_json(
            path,
            &CompareReport {
                input: args.input.display().to_string(),
                filter: filter_name,
                width: img.width(),
                height: img.height(),
                channels: img.channels(),
                runs,
            },
        )?;
    }

    if !mismatches.is_empty() {
        bail!("backends disagree with sequential output: {}", mismatches.join(", "));
    }
    Ok(())
}

fn run_sum(args: SumArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let values: Vec<u32> = (0..args.len).map(|_| rng.gen_range(0..1000)).collect();

    let t0 = Instant::now();
    let sequential: u64 = values.iter().map(|&v| u64::from(v)).sum();
    let sequential_ms = t0.elapsed().as_secs_f64() * 1e3;

    let t0 = Instant::now();
    let parallel = ps_conv::parallel_sum(&values, args.workers).context("parallel sum")?;
    let parallel_ms = t0.elapsed().as_secs_f64() * 1e3;

    println!(
        "sum of {} values: {parallel} ({} workers, {parallel_ms:.3} ms)",
        args.len, args.workers
    );
    println!("sequential: {sequential} ({sequential_ms:.3} ms)");

    if parallel != sequential {
        bail!("parallel sum {parallel} differs from sequential sum {sequential}");
    }
    Ok(())
}

fn resolve_filter(args: &KernelArgs) -> Result<Filter> {
    if let Some(path) = &args.kernel_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading kernel file {}", path.display()))?;
        let rows: Vec<Vec<f32>> = serde_json::from_str(&text)
            .with_context(|| format!("parsing kernel file {}", path.display()))?;
        let kernel = Kernel::from_rows(&rows)
            .with_context(|| format!("validating kernel from {}", path.display()))?;
        return Ok(Filter::Custom(kernel));
    }

    Ok(args.filter.parse::<Filter>()?)
}

fn resolve_config(args: &JobArgs) -> Result<ConvolveConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading job config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing job config {}", path.display()))?
        }
        None => ConvolveConfig::default(),
    };

    if let Some(b) = args.backend {
        config.backend = b.into();
    }
    if let Some(s) = args.strategy {
        config.strategy = s.into();
    }
    if let Some(w) = args.workers {
        config.workers = w;
    }
    if let Some(b) = args.border {
        config.border = b.into();
    }
    if let Some(d) = args.distribution {
        config.distribution = match d {
            DistributionArg::Halo => Distribution::Halo,
            DistributionArg::Broadcast => Distribution::Broadcast,
        };
    }

    config.validate().context("invalid job configuration")?;
    debug!("job config: {config:?}");
    Ok(config)
}

fn load_image(path: &Path) -> Result<PixelBuffer> {
    if ps_pnm::is_pnm_path(path) {
        return ps_pnm::load(path).with_context(|| format!("loading {}", path.display()));
    }

    let decoded = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    let (format, raw) = if decoded.color().has_color() {
        (PixelFormat::Rgb, decoded.into_rgb8().into_raw())
    } else {
        (PixelFormat::Gray, decoded.into_luma8().into_raw())
    };
    let samples = raw.into_iter().map(u16::from).collect();
    PixelBuffer::from_vec(format, w, h, 255, samples)
        .with_context(|| format!("building pixel buffer from {}", path.display()))
}

fn save_image(path: &Path, img: &PixelBuffer) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    if ps_pnm::is_pnm_path(path) {
        return ps_pnm::save(path, img).with_context(|| format!("writing {}", path.display()));
    }

    let max = u32::from(img.max_value());
    let bytes: Vec<u8> = img
        .samples()
        .iter()
        .map(|&v| ((u32::from(v) * 255 + max / 2) / max) as u8)
        .collect();
    let (w, h) = (img.width() as u32, img.height() as u32);
    let dynamic = match img.format() {
        PixelFormat::Gray => GrayImage::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb => RgbImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
    }
    .context("building output raster")?;

    dynamic
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("writing JSON to {}", path.display()))?;
    Ok(())
}
