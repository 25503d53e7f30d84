use std::fmt::{Debug, Display};
use std::ops::{Div, Mul};

use num_complex::Complex64;
use num_traits::NumAssign;

/// Element type of an array.
///
/// Variants are ordered by promotion: the union of two dtypes is the larger one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    Float64,
    Complex128,
}

impl DType {
    /// Returns the dtype both `self` and `other` can be represented in without loss.
    pub fn union(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_complex(self) -> bool {
        self == Self::Complex128
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float64 => write!(f, "float64"),
            Self::Complex128 => write!(f, "complex128"),
        }
    }
}

/// A real or complex element the interpolator computes with.
pub trait Scalar: Copy + Debug + Default + PartialEq + NumAssign + Send + Sync + 'static {
    fn re(self) -> f64;

    fn im(self) -> f64;

    /// Multiplies by a real factor.
    fn scale(self, factor: f64) -> Self;

    /// Exact embedding into the complex plane.
    fn into_complex(self) -> Complex64;
}

/// A scalar that can be multiplied and divided by `X`, keeping its own type.
///
/// Real values over real weights, complex values over real or complex weights.
pub trait ScalarOver<X: Scalar>: Scalar + Mul<X, Output = Self> + Div<X, Output = Self> {}

impl<X: Scalar, Y: Scalar + Mul<X, Output = Y> + Div<X, Output = Y>> ScalarOver<X> for Y {}

impl Scalar for f64 {
    fn re(self) -> f64 {
        self
    }

    fn im(self) -> f64 {
        0.0
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn into_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}

impl Scalar for Complex64 {
    fn re(self) -> f64 {
        self.re
    }

    fn im(self) -> f64 {
        self.im
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn into_complex(self) -> Complex64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;

    use super::{DType, Scalar};

    #[test]
    fn dtype_union_promotes_to_complex() {
        assert_eq!(DType::Float64.union(DType::Float64), DType::Float64);
        assert_eq!(DType::Float64.union(DType::Complex128), DType::Complex128);
        assert_eq!(DType::Complex128.union(DType::Float64), DType::Complex128);
        assert!(!DType::Float64.is_complex());
        assert!(DType::Complex128.is_complex());
    }

    #[test]
    fn dtype_display() {
        assert_eq!(DType::Float64.to_string(), "float64");
        assert_eq!(DType::Complex128.to_string(), "complex128");
    }

    #[test]
    fn real_embedding_is_exact() {
        let x = 0.1_f64;

        let z = x.into_complex();

        assert_eq!(z.re, x);
        assert_eq!(z.im, 0.0);
        assert_eq!(Scalar::scale(z, 3.0), Complex64::new(x * 3.0, 0.0));
    }
}
