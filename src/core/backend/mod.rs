use std::fmt::Debug;

pub use cpu::CpuBackend;
use num_complex::Complex64;

use super::poly::barycentric::BarycentricOps;

pub mod cpu;

pub trait Backend:
    Copy + Clone + Debug + ColumnOps<f64> + ColumnOps<Complex64> + BarycentricOps
{
}

pub trait ColumnOps<T> {
    type Column: Column<T>;
}

pub type Col<B, T> = <B as ColumnOps<T>>::Column;

pub trait Column<T>: Clone + Debug + FromIterator<T> {
    /// Returns a cpu vector of the column.
    fn to_cpu(&self) -> Vec<T>;
    /// Returns the length of the column.
    fn len(&self) -> usize;
    /// Returns true if the column is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Appends the values of a cpu slice to the end of the column.
    fn extend_from_cpu(&mut self, values: &[T]);
}
