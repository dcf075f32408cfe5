use log::debug;
use ps_core::{BorderMode, Error, Kernel, PixelBuffer};
use serde::{Deserialize, Serialize};

use crate::isolated::{Distribution, run_isolated};
use crate::partition::{Strategy, partition, row_bands};
use crate::shared::{run_rayon, run_sequential, run_threads};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single worker on the calling thread.
    Sequential,
    /// One scoped OS thread per region.
    #[default]
    Threads,
    /// Regions scheduled on a rayon pool sized to the worker count.
    Rayon,
    /// Message-passing workers with private buffers and an ordered gather.
    Isolated,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Sequential,
        Backend::Threads,
        Backend::Rayon,
        Backend::Isolated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Threads => "threads",
            Self::Rayon => "rayon",
            Self::Isolated => "isolated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvolveConfig {
    pub workers: usize,
    pub strategy: Strategy,
    pub backend: Backend,
    pub border: BorderMode,
    pub distribution: Distribution,
}

impl Default for ConvolveConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            strategy: Strategy::RowBands,
            backend: Backend::Threads,
            border: BorderMode::Skip,
            distribution: Distribution::Halo,
        }
    }
}

impl ConvolveConfig {
    pub fn with_backend(backend: Backend, workers: usize) -> Self {
        Self {
            workers,
            backend,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::ZeroWorkers);
        }
        if self.backend == Backend::Isolated && self.strategy == Strategy::Quadrants {
            return Err(Error::UnsupportedStrategy(
                "isolated workers exchange row bands only",
            ));
        }
        Ok(())
    }
}

/// Applies `kernel` to every sample of `input`.
///
/// Blocks until every worker has finished. The result is identical for every
/// backend, strategy and worker count.
pub fn convolve(
    input: &PixelBuffer,
    kernel: &Kernel,
    config: &ConvolveConfig,
) -> Result<PixelBuffer, Error> {
    config.validate()?;

    let (w, h) = (input.width(), input.height());
    debug!(
        "convolve {w}x{h}x{}: backend={} strategy={} workers={} border={} kernel={}x{}",
        input.channels(),
        config.backend.name(),
        config.strategy.name(),
        config.workers,
        config.border.name(),
        kernel.side(),
        kernel.side(),
    );

    match config.backend {
        Backend::Sequential => Ok(convolve_sequential(input, kernel, config.border)),
        Backend::Threads => {
            let regions = partition(w, h, config.workers, config.strategy)?;
            run_threads(input, kernel, config.border, &regions)
        }
        Backend::Rayon => {
            let regions = partition(w, h, config.workers, config.strategy)?;
            run_rayon(input, kernel, config.border, &regions, config.workers)
        }
        Backend::Isolated => run_isolated(
            input,
            kernel,
            config.border,
            config.workers,
            config.distribution,
        ),
    }
}

/// Reference single-worker evaluation.
pub fn convolve_sequential(
    input: &PixelBuffer,
    kernel: &Kernel,
    border: BorderMode,
) -> PixelBuffer {
    let regions = row_bands(input.width(), input.height(), 1);
    run_sequential(input, kernel, border, &regions)
}

#[cfg(test)]
mod tests {
    use ps_core::{BorderMode, Error, Filter, Kernel, PixelBuffer, PixelFormat};

    use super::{Backend, ConvolveConfig, convolve, convolve_sequential};
    use crate::isolated::Distribution;
    use crate::partition::Strategy;

    #[test]
    fn config_validation() {
        let mut cfg = ConvolveConfig::with_backend(Backend::Threads, 0);
        assert_eq!(cfg.validate(), Err(Error::ZeroWorkers));

        cfg.workers = 2;
        cfg.backend = Backend::Isolated;
        cfg.strategy = Strategy::Quadrants;
        let err = cfg.validate().expect_err("quadrants over isolated workers");
        assert!(err.is_config());

        cfg.strategy = Strategy::RowBands;
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: ConvolveConfig = serde_json::from_str(
            r#"{"workers": 3, "backend": "isolated", "distribution": {"auto": {"broadcast_below": 64}}}"#,
        )
        .expect("valid config");
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.backend, Backend::Isolated);
        assert_eq!(cfg.strategy, Strategy::RowBands);
        assert_eq!(cfg.border, BorderMode::Skip);
        assert_eq!(
            cfg.distribution,
            Distribution::Auto {
                broadcast_below: 64
            }
        );

        let cfg: ConvolveConfig =
            serde_json::from_str(r#"{"strategy": "quadrants", "border": "clamp"}"#)
                .expect("valid config");
        assert_eq!(cfg.strategy, Strategy::Quadrants);
        assert_eq!(cfg.border, BorderMode::Clamp);
    }

    #[test]
    fn identity_kernel_reproduces_input() {
        let data: Vec<u16> = (0..5 * 4 * 3).map(|i| (i * 11 % 200) as u16).collect();
        let img = PixelBuffer::from_vec(PixelFormat::Rgb, 5, 4, 200, data).expect("valid");

        for side in [1, 3, 5] {
            let k = Kernel::identity(side).expect("valid");
            for backend in Backend::ALL {
                let out = convolve(&img, &k, &ConvolveConfig::with_backend(backend, 3))
                    .expect("convolve");
                assert_eq!(out, img, "side={side} backend={}", backend.name());
            }
        }
    }

    #[test]
    fn empty_image_yields_empty_output() {
        let img = PixelBuffer::new_fill(PixelFormat::Gray, 0, 3, 255, 0).expect("empty image");
        for backend in Backend::ALL {
            let out = convolve(
                &img,
                &Filter::Blur.kernel(),
                &ConvolveConfig::with_backend(backend, 2),
            )
            .expect("convolve");
            assert_eq!(out.samples().len(), 0);
            assert_eq!(out.height(), 3);
        }
        assert_eq!(
            convolve_sequential(&img, &Filter::Blur.kernel(), BorderMode::Skip),
            img
        );
    }
}
