//! Leading eigenpairs of a symmetric matrix.

use ndarray::{Array1, Array2, Axis};

/// Eigenvalue and unit eigenvector.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPair {
    /// Eigenvalue
    pub value: f64,
    /// Unit-norm eigenvector
    pub vector: Array1<f64>,
}

/// The `count` largest eigenpairs of a symmetric positive semi-definite
/// matrix, by power iteration with deflation (A <- A - lambda v v^T).
///
/// Every iterate is kept orthogonal to the vectors already found, so the
/// result is an orthonormal set even when the deflated matrix is only
/// numerical noise. Eigenvalues below `RELATIVE_FLOOR` times the largest are
/// reported as zero. Returned in descending eigenvalue order; `count` is
/// capped at the matrix dimension.
pub fn leading_eigenpairs(
    matrix: &Array2<f64>,
    count: usize,
    max_iterations: usize,
    tolerance: f64,
) -> Vec<EigenPair> {
    let n = matrix.nrows();
    let mut deflated = matrix.clone();
    let mut pairs: Vec<EigenPair> = Vec::with_capacity(count.min(n));

    for _ in 0..count.min(n) {
        let mut pair = power_iteration(&deflated, &pairs, max_iterations, tolerance);

        let largest = pairs.first().map_or(pair.value, |p| p.value);
        if pair.value <= largest * RELATIVE_FLOOR {
            pair.value = 0.0;
        }

        let v = pair.vector.view().insert_axis(Axis(1));
        deflated = &deflated - &(pair.value * v.dot(&v.t()));
        pairs.push(pair);
    }

    pairs.sort_by(|a, b| b.value.total_cmp(&a.value));
    pairs
}

/// Eigenvalues this small relative to the largest are treated as zero.
const RELATIVE_FLOOR: f64 = 1e-12;

fn power_iteration(
    matrix: &Array2<f64>,
    found: &[EigenPair],
    max_iterations: usize,
    tolerance: f64,
) -> EigenPair {
    let n = matrix.nrows();

    // Uneven start so it is unlikely to be orthogonal to the leading vector,
    // falling back to basis vectors if it lies in the span already found.
    let uneven = Array1::from_iter((0..n).map(|i| 1.0 + (i as f64 + 1.0).sqrt()));
    let candidates = std::iter::once(uneven).chain((0..n).map(|i| {
        let mut e = Array1::zeros(n);
        e[i] = 1.0;
        e
    }));

    let mut v = Array1::zeros(n);
    for candidate in candidates {
        let candidate = orthogonalize(candidate, found);
        let length = norm(&candidate);
        if length > 1e-8 {
            v = candidate / length;
            break;
        }
    }

    let mut value = 0.0;
    for _ in 0..max_iterations {
        let next = orthogonalize(matrix.dot(&v), found);
        let next_value = v.dot(&next);
        let next_norm = norm(&next);
        if next_norm < 1e-300 {
            // v lies in the null space: eigenvalue 0
            return EigenPair { value: 0.0, vector: v };
        }

        let next = next / next_norm;
        let delta = norm(&(&next - &v));
        v = next;
        value = next_value;

        if delta < tolerance {
            break;
        }
    }

    EigenPair { value, vector: v }
}

fn orthogonalize(mut v: Array1<f64>, found: &[EigenPair]) -> Array1<f64> {
    for pair in found {
        let projection = v.dot(&pair.vector);
        v.scaled_add(-projection, &pair.vector);
    }
    v
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_diagonal_matrix() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]];
        let pairs = leading_eigenpairs(&m, 2, 1000, 1e-12);

        assert_eq!(pairs.len(), 2);
        assert_relative_eq!(pairs[0].value, 5.0, epsilon = 1e-8);
        assert_relative_eq!(pairs[0].vector[1].abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(pairs[1].value, 3.0, epsilon = 1e-8);
        assert_relative_eq!(pairs[1].vector[2].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_symmetric_matrix() {
        // Eigenvalues 3 and 1 with vectors (1, 1) and (1, -1)
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let pairs = leading_eigenpairs(&m, 2, 1000, 1e-12);

        assert_relative_eq!(pairs[0].value, 3.0, epsilon = 1e-8);
        assert_relative_eq!(pairs[1].value, 1.0, epsilon = 1e-8);
        assert_relative_eq!(
            pairs[0].vector[0] * pairs[0].vector[1],
            0.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_vectors_are_orthonormal_for_rank_one() {
        let u = array![1.0, 2.0, 2.0];
        let m = u.view().insert_axis(Axis(1)).dot(&u.view().insert_axis(Axis(0)));
        let pairs = leading_eigenpairs(&m, 2, 1000, 1e-12);

        assert_relative_eq!(pairs[0].value, 9.0, epsilon = 1e-8);
        assert_eq!(pairs[1].value, 0.0);
        assert_relative_eq!(pairs[0].vector.dot(&pairs[1].vector), 0.0, epsilon = 1e-9);
        assert_relative_eq!(norm(&pairs[1].vector), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_count_capped_at_dimension() {
        let m = array![[4.0]];
        let pairs = leading_eigenpairs(&m, 2, 100, 1e-12);
        assert_eq!(pairs.len(), 1);
        assert_relative_eq!(pairs[0].value, 4.0);
    }

    #[rstest]
    #[case(2.0, 1.0)]
    #[case(5.0, 2.0)]
    #[case(1.0, 0.5)]
    fn test_two_by_two_eigenvalues(#[case] a: f64, #[case] b: f64) {
        // [[a, b], [b, a]] has eigenvalues a + b and a - b.
        let m = array![[a, b], [b, a]];
        let pairs = leading_eigenpairs(&m, 2, 1000, 1e-12);

        assert_relative_eq!(pairs[0].value, a + b, epsilon = 1e-8);
        assert_relative_eq!(pairs[1].value, a - b, epsilon = 1e-8);
    }
}
