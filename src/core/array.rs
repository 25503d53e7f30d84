use ndarray::{arr0, Array, Array1, ArrayD, Dimension};
use num_complex::Complex64;

use super::scalar::{DType, Scalar};

/// An n-dimensional array of real or complex elements.
///
/// This is the type the interpolator accepts and returns. Conversions exist from scalars, vectors,
/// slices, fixed-size arrays and `ndarray` arrays of any dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum DynArray {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl DynArray {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Real(_) => DType::Float64,
            Self::Complex(_) => DType::Complex128,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Returns the total number of elements.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Real(a) => Some(a),
            Self::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ArrayD<Complex64>> {
        match self {
            Self::Real(_) => None,
            Self::Complex(a) => Some(a),
        }
    }

    /// Returns the elements as complex numbers, promoting real arrays.
    pub fn into_complex(self) -> ArrayD<Complex64> {
        match self {
            Self::Real(a) => a.mapv(Scalar::into_complex),
            Self::Complex(a) => a,
        }
    }

    /// Builds a one-dimensional array of `values`.
    pub fn from_column<T: Scalar>(values: Vec<T>) -> Self
    where
        Self: From<ArrayD<T>>,
    {
        Array1::from(values).into_dyn().into()
    }
}

/// Returns the elements of `array` in logical (row-major) order.
pub(crate) fn flatten<T: Copy>(array: &ArrayD<T>) -> Vec<T> {
    array.iter().copied().collect()
}

impl<D: Dimension> From<Array<f64, D>> for DynArray {
    fn from(array: Array<f64, D>) -> Self {
        Self::Real(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<Complex64, D>> for DynArray {
    fn from(array: Array<Complex64, D>) -> Self {
        Self::Complex(array.into_dyn())
    }
}

impl From<f64> for DynArray {
    fn from(value: f64) -> Self {
        arr0(value).into()
    }
}

impl From<Complex64> for DynArray {
    fn from(value: Complex64) -> Self {
        arr0(value).into()
    }
}

impl From<Vec<f64>> for DynArray {
    fn from(values: Vec<f64>) -> Self {
        Array1::from(values).into()
    }
}

impl From<Vec<Complex64>> for DynArray {
    fn from(values: Vec<Complex64>) -> Self {
        Array1::from(values).into()
    }
}

impl From<&[f64]> for DynArray {
    fn from(values: &[f64]) -> Self {
        values.to_vec().into()
    }
}

impl From<&[Complex64]> for DynArray {
    fn from(values: &[Complex64]) -> Self {
        values.to_vec().into()
    }
}

impl<const N: usize> From<[f64; N]> for DynArray {
    fn from(values: [f64; N]) -> Self {
        values.to_vec().into()
    }
}

impl<const N: usize> From<[Complex64; N]> for DynArray {
    fn from(values: [Complex64; N]) -> Self {
        values.to_vec().into()
    }
}
