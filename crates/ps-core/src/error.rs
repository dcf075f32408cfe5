use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    SizeMismatch { expected: usize, actual: usize },
    SampleOutOfRange { index: usize, value: u16, max: u16 },
    InvalidMaxValue,
    UnknownFormat(String),
    InvalidKernel(&'static str),
    UnknownFilter(String),
    ZeroWorkers,
    UnsupportedStrategy(&'static str),
    Distribution { rank: usize, reason: String },
    Gather { rank: usize, reason: String },
    WorkerPanicked { rank: usize },
    Spawn(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::SampleOutOfRange { index, value, max } => {
                write!(f, "sample {index} = {value} exceeds max value {max}")
            }
            Self::InvalidMaxValue => write!(f, "max value must be at least 1"),
            Self::UnknownFormat(tag) => write!(f, "unknown pixel format '{tag}'"),
            Self::InvalidKernel(why) => write!(f, "invalid kernel: {why}"),
            Self::UnknownFilter(name) => {
                let known = crate::Filter::NAMES.join(", ");
                write!(f, "unknown filter '{name}' (expected one of {known})")
            }
            Self::ZeroWorkers => write!(f, "worker count must be at least 1"),
            Self::UnsupportedStrategy(why) => write!(f, "unsupported strategy: {why}"),
            Self::Distribution { rank, reason } => {
                write!(f, "distribution failed at rank {rank}: {reason}")
            }
            Self::Gather { rank, reason } => write!(f, "gather failed at rank {rank}: {reason}"),
            Self::WorkerPanicked { rank } => write!(f, "worker {rank} panicked"),
            Self::Spawn(why) => write!(f, "failed to start workers: {why}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Configuration errors are caller mistakes, as opposed to failures of a
    /// running job.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidKernel(_)
                | Self::UnknownFilter(_)
                | Self::ZeroWorkers
                | Self::UnsupportedStrategy(_)
        )
    }
}
