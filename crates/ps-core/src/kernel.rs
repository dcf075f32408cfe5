use core::str::FromStr;

use crate::Error;

/// Square stencil weights with odd side length, stored row-major.
///
/// `weight(ky, kx)` addresses the tap at offset `(kx - radius, ky - radius)`
/// from the output pixel. Weights need not sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    side: usize,
    weights: Vec<f32>,
}

impl Kernel {
    pub fn from_flat(side: usize, weights: Vec<f32>) -> Result<Self, Error> {
        if side == 0 {
            return Err(Error::InvalidKernel("kernel is empty"));
        }
        if side.is_multiple_of(2) {
            return Err(Error::InvalidKernel("side length must be odd"));
        }
        if weights.len() != side * side {
            return Err(Error::InvalidKernel("weights must form a square"));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidKernel("weights must be finite"));
        }

        Ok(Self { side, weights })
    }

    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, Error> {
        let side = rows.len();
        if rows.iter().any(|r| r.as_ref().len() != side) {
            return Err(Error::InvalidKernel("weights must form a square"));
        }

        let weights = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::from_flat(side, weights)
    }

    /// A kernel whose only nonzero weight is a `1` at the center.
    pub fn identity(side: usize) -> Result<Self, Error> {
        let mut weights = vec![0.0; side * side];
        if let Some(center) = weights.get_mut(side * side / 2) {
            *center = 1.0;
        }
        Self::from_flat(side, weights)
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn radius(&self) -> usize {
        (self.side - 1) / 2
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weight(&self, ky: usize, kx: usize) -> f32 {
        self.weights[ky * self.side + kx]
    }

    pub fn center(&self) -> f32 {
        let r = self.radius();
        self.weight(r, r)
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

/// Named filters resolved once per job into a concrete [`Kernel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Blur,
    Laplace,
    Sharpen,
    Custom(Kernel),
}

const BLUR_3X3: [f32; 9] = [1.0 / 9.0; 9];
const LAPLACE_3X3: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 0.0];
const SHARPEN_3X3: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

impl Filter {
    pub const NAMES: [&'static str; 3] = ["blur", "laplace", "sharpen"];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Laplace => "laplace",
            Self::Sharpen => "sharpen",
            Self::Custom(_) => "custom",
        }
    }

    pub fn kernel(&self) -> Kernel {
        let table = match self {
            Self::Blur => &BLUR_3X3,
            Self::Laplace => &LAPLACE_3X3,
            Self::Sharpen => &SHARPEN_3X3,
            Self::Custom(k) => return k.clone(),
        };
        Kernel {
            side: 3,
            weights: table.to_vec(),
        }
    }

    pub fn into_kernel(self) -> Kernel {
        match self {
            Self::Custom(k) => k,
            named => named.kernel(),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blur" => Ok(Self::Blur),
            "laplace" | "laplacian" => Ok(Self::Laplace),
            "sharpen" => Ok(Self::Sharpen),
            _ => Err(Error::UnknownFilter(s.to_string())),
        }
    }
}
