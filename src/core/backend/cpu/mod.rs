mod barycentric;

use super::{Backend, Column, ColumnOps};
use crate::core::poly::barycentric::BarycentricInterpolator;
use crate::core::scalar::Scalar;

#[derive(Copy, Clone, Debug, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {}

impl<T: Scalar> ColumnOps<T> for CpuBackend {
    type Column = Vec<T>;
}

impl<T: Scalar> Column<T> for Vec<T> {
    fn to_cpu(&self) -> Vec<T> {
        self.clone()
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn extend_from_cpu(&mut self, values: &[T]) {
        self.extend_from_slice(values);
    }
}

pub type CpuBarycentricInterpolator = BarycentricInterpolator<CpuBackend>;
