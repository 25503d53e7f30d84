use std::iter::once;

use itertools::Itertools;
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use thiserror::Error;
use tracing::{debug, span, Level};

use crate::core::array::{flatten, DynArray};
use crate::core::backend::{Backend, Col, Column, ColumnOps, CpuBackend};
use crate::core::scalar::{DType, Scalar, ScalarOver};

pub type InterpolationResult<T> = Result<T, InterpolationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("interpolator is incomplete: no sample values have been set")]
    Incomplete,
    #[error("expected {expected} sample values along the interpolation axis, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("sample values have trailing shape {actual:?}, expected {expected:?}")]
    TrailingShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("sample values must be at least one-dimensional")]
    ScalarValues,
    #[error("axis {axis} is out of bounds for sample values of dimension {ndim}")]
    AxisOutOfBounds { axis: isize, ndim: usize },
    #[error("abscissae must be at most one-dimensional, got {ndim} dimensions")]
    NotOneDimensional { ndim: usize },
    #[error("no previous sample values to extend")]
    NoValuesToExtend,
    #[error("sample values are required for the new abscissae")]
    MissingValues,
}

pub trait BarycentricOps: ColumnOps<f64> + ColumnOps<Complex64> + Sized {
    /// Appends `new_xi` to `nodes` one point at a time and recomputes the weights.
    ///
    /// `nodes.inv_capacity` is first updated to [`inverse_capacity`] of all points, old and new,
    /// and the stored products are rescaled to match. Appending `x_new` then multiplies the
    /// product of every node already present by `c·(x_i - x_new)` and gives `x_new` the product
    /// `Π_i c·(x_new - x_i)`. Building from scratch is the same as appending to an empty set.
    fn extend_nodes<X: Scalar>(nodes: &mut BarycentricNodes<Self, X>, new_xi: &[X])
    where
        Self: ColumnOps<X>;

    /// Evaluates the interpolant at every point of `queries`.
    ///
    /// `yi` holds one row of `n_components` values per node and the result holds one such row per
    /// query. A query that coincides exactly with a node yields that node's row unchanged.
    fn barycentric_eval<X: Scalar, Y: ScalarOver<X>>(
        nodes: &BarycentricNodes<Self, X>,
        yi: &Col<Self, Y>,
        n_components: usize,
        queries: &[X],
    ) -> Vec<Y>
    where
        Self: ColumnOps<X> + ColumnOps<Y>;
}

/// Abscissae of an interpolator together with their barycentric weights.
#[derive(Clone, Debug)]
pub struct BarycentricNodes<B: ColumnOps<X>, X: Scalar> {
    pub xi: Col<B, X>,
    /// `Π_{j≠i} c·(x_i - x_j)` for every node, in insertion order.
    pub products: Col<B, X>,
    /// Reciprocals of `products`.
    pub wi: Col<B, X>,
    /// The factor `c` every node distance is scaled by.
    pub inv_capacity: f64,
}

impl<B: ColumnOps<X>, X: Scalar> BarycentricNodes<B, X> {
    fn empty() -> Self {
        Self {
            xi: std::iter::empty().collect(),
            products: std::iter::empty().collect(),
            wi: std::iter::empty().collect(),
            inv_capacity: 1.0,
        }
    }

    pub fn len(&self) -> usize {
        self.xi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xi.is_empty()
    }
}

impl<B: BarycentricOps + ColumnOps<X>, X: Scalar> BarycentricNodes<B, X> {
    pub fn new(xi: &[X]) -> Self {
        let mut nodes = Self::empty();
        B::extend_nodes(&mut nodes, xi);
        nodes
    }
}

impl<B: ColumnOps<X> + ColumnOps<Complex64>, X: Scalar> BarycentricNodes<B, X> {
    fn to_complex(&self) -> BarycentricNodes<B, Complex64> {
        BarycentricNodes {
            xi: promote_column::<B, X>(&self.xi),
            products: promote_column::<B, X>(&self.products),
            wi: promote_column::<B, X>(&self.wi),
            inv_capacity: self.inv_capacity,
        }
    }
}

fn promote_column<B: ColumnOps<X> + ColumnOps<Complex64>, X: Scalar>(
    column: &Col<B, X>,
) -> Col<B, Complex64> {
    column
        .to_cpu()
        .into_iter()
        .map(Scalar::into_complex)
        .collect()
}

/// Returns `4 / span`, where `span` is the diagonal of the bounding box of `xi` in the complex
/// plane. Falls back to `1` when there are fewer than two points or the span is degenerate.
pub fn inverse_capacity<X: Scalar>(xi: impl Iterator<Item = X> + Clone) -> f64 {
    fn extent(values: impl Iterator<Item = f64>) -> f64 {
        values
            .minmax()
            .into_option()
            .map_or(0.0, |(min, max)| max - min)
    }

    let span = extent(xi.clone().map(|x| x.re())).hypot(extent(xi.clone().map(|x| x.im())));
    if xi.count() >= 2 && span.is_finite() && span > 0.0 {
        4.0 / span
    } else {
        1.0
    }
}

#[derive(Clone, Debug)]
enum Nodes<B: Backend> {
    Real(BarycentricNodes<B, f64>),
    Complex(BarycentricNodes<B, Complex64>),
}

impl<B: Backend> Nodes<B> {
    fn len(&self) -> usize {
        match self {
            Self::Real(nodes) => nodes.len(),
            Self::Complex(nodes) => nodes.len(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            Self::Real(_) => DType::Float64,
            Self::Complex(_) => DType::Complex128,
        }
    }
}

#[derive(Clone, Debug)]
enum ValueColumn<B: Backend> {
    Real(Col<B, f64>),
    Complex(Col<B, Complex64>),
}

/// Position of the sample axis in a value array and the shape of the remaining axes.
struct ValueLayout {
    axis: usize,
    n_samples: usize,
    trailing_shape: Vec<usize>,
}

impl ValueLayout {
    fn new(shape: &[usize], axis: isize) -> InterpolationResult<Self> {
        let ndim = shape.len();
        if ndim == 0 {
            return Err(InterpolationError::ScalarValues);
        }
        let signed_ndim = ndim as isize;
        if !(-signed_ndim..signed_ndim).contains(&axis) {
            return Err(InterpolationError::AxisOutOfBounds { axis, ndim });
        }
        let axis = axis.rem_euclid(signed_ndim) as usize;
        let mut trailing_shape = shape.to_vec();
        let n_samples = trailing_shape.remove(axis);
        Ok(Self {
            axis,
            n_samples,
            trailing_shape,
        })
    }
}

/// Sample values stored sample-major: one row of `n_components` values per node.
#[derive(Clone, Debug)]
struct SampleValues<B: Backend> {
    column: ValueColumn<B>,
    /// Position of the sample axis in the caller's layout.
    axis: usize,
    trailing_shape: Vec<usize>,
}

impl<B: Backend> SampleValues<B> {
    fn new(yi: DynArray, layout: ValueLayout) -> Self {
        let column = match yi {
            DynArray::Real(yi) => {
                ValueColumn::Real(sample_major(&yi, layout.axis).into_iter().collect())
            }
            DynArray::Complex(yi) => {
                ValueColumn::Complex(sample_major(&yi, layout.axis).into_iter().collect())
            }
        };
        Self {
            column,
            axis: layout.axis,
            trailing_shape: layout.trailing_shape,
        }
    }

    fn n_components(&self) -> usize {
        self.trailing_shape.iter().product()
    }

    fn dtype(&self) -> DType {
        match self.column {
            ValueColumn::Real(_) => DType::Float64,
            ValueColumn::Complex(_) => DType::Complex128,
        }
    }

    fn append(&mut self, yi: DynArray) {
        if self.dtype().union(yi.dtype()).is_complex() {
            self.promote_to_complex();
        }
        match (&mut self.column, yi) {
            (ValueColumn::Real(column), DynArray::Real(yi)) => {
                column.extend_from_cpu(&sample_major(&yi, self.axis))
            }
            (ValueColumn::Complex(column), yi) => {
                column.extend_from_cpu(&sample_major(&yi.into_complex(), self.axis))
            }
            (ValueColumn::Real(_), DynArray::Complex(_)) => {
                unreachable!("values are promoted before appending")
            }
        }
    }

    fn promote_to_complex(&mut self) {
        if let ValueColumn::Real(column) = &self.column {
            debug!(n_values = column.len(), "Promoting sample values to complex");
            self.column = ValueColumn::Complex(promote_column::<B, f64>(column));
        }
    }

    /// Returns the values in the layout they were given in.
    fn to_array(&self, n_samples: usize) -> DynArray {
        let shape = once(n_samples)
            .chain(self.trailing_shape.iter().copied())
            .collect_vec();
        let perm = (1..=self.axis)
            .chain(once(0))
            .chain(self.axis + 1..shape.len())
            .collect_vec();
        match &self.column {
            ValueColumn::Real(column) => DynArray::Real(arrange(column.to_cpu(), &shape, &perm)),
            ValueColumn::Complex(column) => {
                DynArray::Complex(arrange(column.to_cpu(), &shape, &perm))
            }
        }
    }

    /// Arranges evaluation rows, laid out as `query_shape + trailing_shape`, so that the query axes
    /// take the place of the sample axis.
    fn output_array<T: Clone>(&self, rows: Vec<T>, query_shape: &[usize]) -> ArrayD<T> {
        let k = query_shape.len();
        let shape = query_shape
            .iter()
            .chain(&self.trailing_shape)
            .copied()
            .collect_vec();
        let perm = (k..k + self.axis)
            .chain(0..k)
            .chain(k + self.axis..shape.len())
            .collect_vec();
        arrange(rows, &shape, &perm)
    }
}

/// Flattens `array` with `axis` moved to the front.
fn sample_major<T: Copy>(array: &ArrayD<T>, axis: usize) -> Vec<T> {
    let perm = once(axis)
        .chain((0..array.ndim()).filter(|&i| i != axis))
        .collect_vec();
    array
        .view()
        .permuted_axes(IxDyn(&perm))
        .iter()
        .copied()
        .collect()
}

/// Reshapes row-major `values` to `shape` and permutes its axes so that axis `i` of the result is
/// axis `perm[i]` of the reshaped array.
fn arrange<T: Clone>(values: Vec<T>, shape: &[usize], perm: &[usize]) -> ArrayD<T> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .expect("column length matches its shape")
        .permuted_axes(IxDyn(perm))
        .as_standard_layout()
        .into_owned()
}

fn abscissae(xi: DynArray) -> InterpolationResult<DynArray> {
    match xi.ndim() {
        0 | 1 => Ok(xi),
        ndim => Err(InterpolationError::NotOneDimensional { ndim }),
    }
}

/// The polynomial interpolating a set of points, evaluated in barycentric form.
///
/// Evaluating at `x` computes
///
/// ```text
/// P(x) = Σ_i [w_i / (x - x_i) · y_i] / Σ_i [w_i / (x - x_i)]
/// ```
///
/// which costs `O(n)` per point once the weights `w_i` are known. Weights depend on the abscissae
/// only, so values may be supplied later with [`Self::set_yi`], and new points can be appended with
/// [`Self::add_xi`] in `O(n)` per point.
///
/// Values may be vector-valued: with values of shape `(n, *trailing)` an evaluation at a query of
/// shape `S` has shape `S + trailing`. The sample axis of the values can be moved with
/// [`Self::with_axis`].
///
/// Abscissae are assumed to be distinct. Duplicates are not detected and give non-finite weights.
#[derive(Clone, Debug)]
pub struct BarycentricInterpolator<B: Backend = CpuBackend> {
    nodes: Nodes<B>,
    values: Option<SampleValues<B>>,
    axis: isize,
}

impl<B: Backend> BarycentricInterpolator<B> {
    /// Creates an interpolator over `xi` with no values.
    pub fn new(xi: impl Into<DynArray>) -> InterpolationResult<Self> {
        Self::with_axis(xi, None, 0)
    }

    /// Creates an interpolator through the points `(xi, yi)`. The first axis of `yi` is the
    /// sample axis.
    pub fn with_values(
        xi: impl Into<DynArray>,
        yi: impl Into<DynArray>,
    ) -> InterpolationResult<Self> {
        Self::with_axis(xi, Some(yi.into()), 0)
    }

    /// Creates an interpolator whose values have their samples along `axis`. Negative axes count
    /// from the end. The axis applies to every later [`Self::set_yi`] and [`Self::add_xi`].
    pub fn with_axis(
        xi: impl Into<DynArray>,
        yi: Option<DynArray>,
        axis: isize,
    ) -> InterpolationResult<Self> {
        let nodes = match abscissae(xi.into())? {
            DynArray::Real(xi) => Nodes::Real(BarycentricNodes::new(&flatten(&xi))),
            DynArray::Complex(xi) => Nodes::Complex(BarycentricNodes::new(&flatten(&xi))),
        };
        let mut interpolator = Self {
            nodes,
            values: None,
            axis,
        };
        if let Some(yi) = yi {
            interpolator.set_yi(yi)?;
        }
        Ok(interpolator)
    }

    /// Returns the number of sample points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn axis(&self) -> isize {
        self.axis
    }

    pub fn xi(&self) -> DynArray {
        match &self.nodes {
            Nodes::Real(nodes) => DynArray::from_column(nodes.xi.to_cpu()),
            Nodes::Complex(nodes) => DynArray::from_column(nodes.xi.to_cpu()),
        }
    }

    /// Returns the barycentric weights, scaled by `inv_capacity^-(n-1)`.
    pub fn wi(&self) -> DynArray {
        match &self.nodes {
            Nodes::Real(nodes) => DynArray::from_column(nodes.wi.to_cpu()),
            Nodes::Complex(nodes) => DynArray::from_column(nodes.wi.to_cpu()),
        }
    }

    /// Returns the sample values in the layout they were given in, if set.
    pub fn yi(&self) -> Option<DynArray> {
        self.values
            .as_ref()
            .map(|values| values.to_array(self.len()))
    }

    pub fn abscissa_dtype(&self) -> DType {
        self.nodes.dtype()
    }

    pub fn value_dtype(&self) -> Option<DType> {
        self.values.as_ref().map(SampleValues::dtype)
    }

    /// Returns the shape of a single sample's value, if values are set.
    pub fn value_shape(&self) -> Option<&[usize]> {
        self.values
            .as_ref()
            .map(|values| values.trailing_shape.as_slice())
    }

    /// Sets or replaces the sample values.
    ///
    /// `yi` must have one entry per sample point along the interpolation axis. Once values are
    /// set, replacements must keep the same trailing shape. On error the interpolator is left
    /// unchanged.
    pub fn set_yi(&mut self, yi: impl Into<DynArray>) -> InterpolationResult<()> {
        let yi = yi.into();
        let layout = ValueLayout::new(yi.shape(), self.axis)?;
        if layout.n_samples != self.len() {
            return Err(InterpolationError::LengthMismatch {
                expected: self.len(),
                actual: layout.n_samples,
            });
        }
        if let Some(values) = &self.values {
            if values.trailing_shape != layout.trailing_shape {
                return Err(InterpolationError::TrailingShapeMismatch {
                    expected: values.trailing_shape.clone(),
                    actual: layout.trailing_shape,
                });
            }
        }
        self.values = Some(SampleValues::new(yi, layout));
        Ok(())
    }

    /// Drops the sample values, keeping the abscissae and weights.
    pub fn clear_yi(&mut self) {
        self.values = None;
    }

    /// Appends sample points.
    ///
    /// `yi` is required if and only if values are set, and must then hold one entry per new point
    /// along the interpolation axis with the established trailing shape. Complex points or values
    /// promote the interpolator to complex. On error the interpolator is left unchanged.
    pub fn add_xi(
        &mut self,
        xi: impl Into<DynArray>,
        yi: Option<DynArray>,
    ) -> InterpolationResult<()> {
        let xi = abscissae(xi.into())?;
        let new_values = match (&self.values, yi) {
            (None, None) => None,
            (None, Some(_)) => return Err(InterpolationError::NoValuesToExtend),
            (Some(_), None) => return Err(InterpolationError::MissingValues),
            (Some(values), Some(yi)) => {
                let layout = ValueLayout::new(yi.shape(), self.axis)?;
                if layout.n_samples != xi.len() {
                    return Err(InterpolationError::LengthMismatch {
                        expected: xi.len(),
                        actual: layout.n_samples,
                    });
                }
                if layout.trailing_shape != values.trailing_shape {
                    return Err(InterpolationError::TrailingShapeMismatch {
                        expected: values.trailing_shape.clone(),
                        actual: layout.trailing_shape,
                    });
                }
                Some(yi)
            }
        };

        self.extend_nodes(xi);
        if let (Some(values), Some(yi)) = (&mut self.values, new_values) {
            values.append(yi);
        }
        Ok(())
    }

    fn extend_nodes(&mut self, xi: DynArray) {
        if self.nodes.dtype().union(xi.dtype()).is_complex() {
            if let Nodes::Real(nodes) = &self.nodes {
                debug!(n_nodes = nodes.len(), "Promoting abscissae to complex");
                self.nodes = Nodes::Complex(nodes.to_complex());
            }
        }
        match (&mut self.nodes, xi) {
            (Nodes::Real(nodes), DynArray::Real(xi)) => B::extend_nodes(nodes, &flatten(&xi)),
            (Nodes::Complex(nodes), xi) => {
                B::extend_nodes(nodes, &flatten(&xi.into_complex()))
            }
            (Nodes::Real(_), DynArray::Complex(_)) => {
                unreachable!("abscissae are promoted before extension")
            }
        }
    }

    /// Evaluates the interpolating polynomial at `x`.
    ///
    /// The result has shape `x.shape() + trailing`, with the query axes in place of the sample
    /// axis when it is not the first. Points of `x` equal to a sample point give that sample's
    /// value exactly.
    pub fn evaluate(&self, x: impl Into<DynArray>) -> InterpolationResult<DynArray> {
        let values = self
            .values
            .as_ref()
            .ok_or(InterpolationError::Incomplete)?;
        let x = x.into();
        let query_shape = x.shape().to_vec();
        let n_components = values.n_components();
        let _span = span!(
            Level::DEBUG,
            "Barycentric evaluation",
            n_nodes = self.len(),
            n_queries = x.len()
        )
        .entered();

        Ok(match (&self.nodes, x, &values.column) {
            (Nodes::Real(nodes), DynArray::Real(x), ValueColumn::Real(yi)) => {
                let rows = B::barycentric_eval::<f64, f64>(nodes, yi, n_components, &flatten(&x));
                DynArray::Real(values.output_array(rows, &query_shape))
            }
            (Nodes::Real(nodes), DynArray::Real(x), ValueColumn::Complex(yi)) => {
                let rows =
                    B::barycentric_eval::<f64, Complex64>(nodes, yi, n_components, &flatten(&x));
                DynArray::Complex(values.output_array(rows, &query_shape))
            }
            (nodes, x, column) => {
                let promoted_nodes;
                let nodes = match nodes {
                    Nodes::Complex(nodes) => nodes,
                    Nodes::Real(nodes) => {
                        promoted_nodes = nodes.to_complex();
                        &promoted_nodes
                    }
                };
                let promoted_values;
                let yi = match column {
                    ValueColumn::Complex(yi) => yi,
                    ValueColumn::Real(yi) => {
                        promoted_values = promote_column::<B, f64>(yi);
                        &promoted_values
                    }
                };
                let rows = B::barycentric_eval::<Complex64, Complex64>(
                    nodes,
                    yi,
                    n_components,
                    &flatten(&x.into_complex()),
                );
                DynArray::Complex(values.output_array(rows, &query_shape))
            }
        })
    }
}

/// Evaluates at `x` the polynomial interpolating the points `(xi, yi)`.
///
/// Equivalent to building a [`BarycentricInterpolator`] and evaluating it once.
pub fn interpolate(
    xi: impl Into<DynArray>,
    yi: impl Into<DynArray>,
    x: impl Into<DynArray>,
) -> InterpolationResult<DynArray> {
    BarycentricInterpolator::<CpuBackend>::with_values(xi, yi)?.evaluate(x)
}

/// Like [`interpolate`], with the samples of `yi` along `axis`.
pub fn interpolate_along_axis(
    xi: impl Into<DynArray>,
    yi: impl Into<DynArray>,
    x: impl Into<DynArray>,
    axis: isize,
) -> InterpolationResult<DynArray> {
    BarycentricInterpolator::<CpuBackend>::with_axis(xi, Some(yi.into()), axis)?.evaluate(x)
}
