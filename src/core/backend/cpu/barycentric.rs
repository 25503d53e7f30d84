use std::iter::zip;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{span, Level};

use super::CpuBackend;
use crate::core::backend::Col;
use crate::core::poly::barycentric::{inverse_capacity, BarycentricNodes, BarycentricOps};
use crate::core::scalar::{Scalar, ScalarOver};

impl BarycentricOps for CpuBackend {
    fn extend_nodes<X: Scalar>(nodes: &mut BarycentricNodes<Self, X>, new_xi: &[X]) {
        let _span = span!(
            Level::TRACE,
            "Extend barycentric weights",
            n_nodes = nodes.xi.len(),
            n_new = new_xi.len()
        )
        .entered();

        let c = inverse_capacity(nodes.xi.iter().chain(new_xi).copied());
        rescale_products(&mut nodes.products, c / nodes.inv_capacity);
        nodes.inv_capacity = c;

        nodes.xi.reserve(new_xi.len());
        nodes.products.reserve(new_xi.len());
        for &x_new in new_xi {
            let mut product = X::one();
            for (p, &x) in zip(&mut nodes.products, &nodes.xi) {
                *p *= (x - x_new).scale(c);
                product *= (x_new - x).scale(c);
            }
            nodes.xi.push(x_new);
            nodes.products.push(product);
        }
        nodes.wi = nodes.products.iter().map(|&p| X::one() / p).collect();
    }

    fn barycentric_eval<X: Scalar, Y: ScalarOver<X>>(
        nodes: &BarycentricNodes<Self, X>,
        yi: &Col<Self, Y>,
        n_components: usize,
        queries: &[X],
    ) -> Vec<Y> {
        let _span = span!(
            Level::TRACE,
            "Barycentric sums",
            n_nodes = nodes.xi.len(),
            n_queries = queries.len(),
            n_components
        )
        .entered();

        let mut res = vec![Y::zero(); queries.len() * n_components];
        if n_components == 0 {
            return res;
        }

        let matches = exact_node_matches(&nodes.xi, queries);
        let eval_row = |(row, (&q, node)): (&mut [Y], (&X, &Option<usize>))| match *node {
            Some(i) => row.copy_from_slice(&yi[i * n_components..(i + 1) * n_components]),
            None => barycentric_sum(q, &nodes.xi, &nodes.wi, yi, row),
        };

        #[cfg(not(feature = "parallel"))]
        res.chunks_exact_mut(n_components)
            .zip(zip(queries, &matches))
            .for_each(eval_row);

        #[cfg(feature = "parallel")]
        res.par_chunks_exact_mut(n_components)
            .zip(queries.par_iter().zip(matches.par_iter()))
            .for_each(eval_row);

        res
    }
}

/// Multiplies each of the `n - 1` distance factors in every product by `ratio`.
fn rescale_products<X: Scalar>(products: &mut [X], ratio: f64) {
    if ratio == 1.0 || products.len() < 2 {
        return;
    }
    let n_factors = products.len() - 1;
    let factor = ratio.powi(n_factors as i32);
    if factor.is_normal() {
        products.iter_mut().for_each(|p| *p = p.scale(factor));
        return;
    }
    // The combined factor is out of range, while each rescaled product need not be.
    for p in products {
        for _ in 0..n_factors {
            *p = p.scale(ratio);
        }
    }
}

/// Returns, for every query, the index of the first node it coincides with exactly.
fn exact_node_matches<X: Scalar>(xi: &[X], queries: &[X]) -> Vec<Option<usize>> {
    queries
        .iter()
        .map(|&q| xi.iter().position(|&x| q - x == X::zero()))
        .collect()
}

/// Writes `Σ_i c_i·y_i / Σ_i c_i` with `c_i = w_i / (q - x_i)` to `row`, which must be zeroed.
///
/// `q` must not coincide with any node.
fn barycentric_sum<X: Scalar, Y: ScalarOver<X>>(
    q: X,
    xi: &[X],
    wi: &[X],
    yi: &[Y],
    row: &mut [Y],
) {
    let mut denominator = X::zero();
    for ((&x, &w), y_row) in zip(zip(xi, wi), yi.chunks_exact(row.len())) {
        let c = w / (q - x);
        denominator += c;
        for (v, &y) in zip(row.iter_mut(), y_row) {
            *v += y * c;
        }
    }
    row.iter_mut().for_each(|v| *v = *v / denominator);
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::iter::zip;

    use approx::assert_relative_eq;
    use num_complex::Complex64;
    use num_traits::Zero;

    use super::{exact_node_matches, rescale_products};
    use crate::core::backend::CpuBackend;
    use crate::core::poly::barycentric::{BarycentricNodes, BarycentricOps};

    type Nodes<X> = BarycentricNodes<CpuBackend, X>;

    #[test]
    fn weights_match_product_formula() {
        let xi = [-1.5, 0.25, 2.0, 3.5, 7.0];
        let nodes = Nodes::<f64>::new(&xi);
        let c = nodes.inv_capacity;

        for (i, &x) in xi.iter().enumerate() {
            let expected = 1.0
                / xi.iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &xj)| c * (x - xj))
                    .product::<f64>();
            assert_relative_eq!(nodes.wi[i], expected, max_relative = 1e-14);
        }
    }

    #[test]
    fn inverse_capacity_scales_by_span() {
        let nodes = Nodes::<f64>::new(&[-3.0, 1.0, 5.0]);

        assert_eq!(nodes.inv_capacity, 0.5);
    }

    #[test]
    fn degenerate_span_does_not_scale() {
        assert_eq!(Nodes::<f64>::new(&[]).inv_capacity, 1.0);
        assert_eq!(Nodes::<f64>::new(&[2.0]).inv_capacity, 1.0);
        assert_eq!(Nodes::<f64>::new(&[f64::INFINITY, 1.0]).inv_capacity, 1.0);
    }

    #[test]
    fn single_node_has_unit_weight() {
        let nodes = Nodes::<f64>::new(&[4.0]);

        assert_eq!(nodes.wi, vec![1.0]);
    }

    #[test]
    fn extension_repeats_construction_exactly() {
        // The extremes come first, so every prefix of two or more points has the full span.
        let xi = [-4.0, 6.5, 0.5, -1.0, 3.0, 2.25];
        let full = Nodes::<f64>::new(&xi);

        for split in 0..=xi.len() {
            let mut nodes = Nodes::<f64>::new(&[]);

            CpuBackend::extend_nodes(&mut nodes, &xi[..split]);
            CpuBackend::extend_nodes(&mut nodes, &xi[split..]);

            assert_eq!(nodes.xi, full.xi);
            assert_eq!(nodes.products, full.products);
            assert_eq!(nodes.wi, full.wi);
        }
    }

    #[test]
    fn capacity_follows_bounding_box() {
        let mut nodes = Nodes::<f64>::new(&[0.0, 1.0]);
        assert_eq!(nodes.inv_capacity, 4.0);

        CpuBackend::extend_nodes(&mut nodes, &[3.0, 2.0]);

        let full = Nodes::<f64>::new(&[0.0, 1.0, 3.0, 2.0]);
        assert_relative_eq!(nodes.inv_capacity, 4.0 / 3.0, max_relative = 1e-15);
        for (&w, &expected) in zip(&nodes.wi, &full.wi) {
            assert_relative_eq!(w, expected, max_relative = 1e-13);
        }
    }

    #[test]
    fn extending_a_narrow_cluster_keeps_weights_finite() {
        let n = 100;
        let xi = (0..=n)
            .map(|j| (j as f64 * PI / n as f64).cos())
            .collect::<Vec<_>>();
        let full = Nodes::<f64>::new(&xi);
        let mut nodes = Nodes::<f64>::new(&xi[..2]);

        CpuBackend::extend_nodes(&mut nodes, &xi[2..]);

        assert_eq!(nodes.inv_capacity, full.inv_capacity);
        for (&w, &expected) in zip(&nodes.wi, &full.wi) {
            assert!(w.is_finite() && w != 0.0);
            assert_relative_eq!(w, expected, max_relative = 1e-9);
        }
    }

    #[test]
    fn rescale_handles_out_of_range_combined_factor() {
        let mut products = vec![1e200; 41];

        rescale_products(&mut products, 1e-10);

        // 1e-400 is out of range, the rescaled products are not.
        for p in products {
            assert_relative_eq!(p, 1e-200, max_relative = 1e-12);
        }
    }

    #[test]
    fn complex_weights_match_product_formula() {
        let xi = [
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(-1.0, 0.0),
            Complex64::new(0.0, -1.0),
        ];
        let nodes = Nodes::<Complex64>::new(&xi);
        let c = nodes.inv_capacity;

        // Span is the diagonal of the [-1, 1]^2 box.
        assert_relative_eq!(c, 4.0 / 8f64.sqrt(), max_relative = 1e-15);
        for (i, &x) in xi.iter().enumerate() {
            let product = xi
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &xj)| (x - xj) * c)
                .product::<Complex64>();
            let expected = Complex64::new(1.0, 0.0) / product;
            assert_relative_eq!(nodes.wi[i].re, expected.re, epsilon = 1e-14);
            assert_relative_eq!(nodes.wi[i].im, expected.im, epsilon = 1e-14);
        }
    }

    #[test]
    fn exact_matches_pick_first_node() {
        let xi = [1.0, 2.0, 1.0];
        let queries = [1.0, 1.5, 2.0, -0.0];

        let matches = exact_node_matches(&xi, &queries);

        assert_eq!(matches, vec![Some(0), None, Some(1), None]);
    }

    #[test]
    fn eval_returns_node_rows_exactly() {
        let xi = [0.1, 0.7, 1.3];
        let yi = vec![0.3, -1.0, 2.2, 5.0, 1.0 / 3.0, 9.0];
        let nodes = Nodes::<f64>::new(&xi);

        let res = CpuBackend::barycentric_eval::<f64, f64>(&nodes, &yi, 2, &xi);

        assert_eq!(res, yi);
    }

    #[test]
    fn eval_reproduces_line() {
        let xi = [0.0, 1.0, 3.0];
        let yi = vec![1.0, 3.0, 7.0];
        let nodes = Nodes::<f64>::new(&xi);

        let res = CpuBackend::barycentric_eval::<f64, f64>(&nodes, &yi, 1, &[0.5, 2.0, -4.0]);

        assert_relative_eq!(res[0], 2.0, max_relative = 1e-14);
        assert_relative_eq!(res[1], 5.0, max_relative = 1e-14);
        assert_relative_eq!(res[2], -7.0, max_relative = 1e-14);
    }

    #[test]
    fn eval_without_components_is_empty() {
        let nodes = Nodes::<f64>::new(&[0.0, 1.0]);

        let res = CpuBackend::barycentric_eval::<f64, f64>(&nodes, &vec![], 0, &[0.5, 2.0]);

        assert!(res.is_empty());
    }

    #[test]
    fn eval_without_nodes_is_nan() {
        let nodes = Nodes::<f64>::new(&[]);

        let res = CpuBackend::barycentric_eval::<f64, f64>(&nodes, &vec![], 1, &[0.5]);

        assert!(res[0].is_nan());
    }

    #[test]
    fn eval_real_nodes_complex_values() {
        let xi = [0.0, 1.0];
        let yi = vec![Complex64::zero(), Complex64::new(2.0, -4.0)];
        let nodes = Nodes::<f64>::new(&xi);

        let res = CpuBackend::barycentric_eval::<f64, Complex64>(&nodes, &yi, 1, &[0.25]);

        assert_relative_eq!(res[0].re, 0.5, max_relative = 1e-14);
        assert_relative_eq!(res[0].im, -1.0, max_relative = 1e-14);
    }
}
