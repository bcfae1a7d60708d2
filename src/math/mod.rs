//! Flat-triangle storage for symmetric matrices.
//!
//! The BFGS inverse Hessian and the scoring-function type-pair table are
//! both symmetric, so only the upper triangle is stored, in a flat buffer
//! addressed by [`mr`] / [`mp`].

/// Index into flat upper-triangle storage; requires `i <= j`.
#[inline]
pub fn mr(i: usize, j: usize) -> usize {
    debug_assert!(i <= j);
    j * (j + 1) / 2 + i
}

/// Permissive variant of [`mr`] that accepts indices in either order.
#[inline]
pub fn mp(i: usize, j: usize) -> usize {
    if i <= j {
        mr(i, j)
    } else {
        mr(j, i)
    }
}

/// Symmetric matrix stored as a flat upper triangle of `n (n + 1) / 2`
/// elements.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangularMatrix {
    n: usize,
    data: Vec<f64>,
}

impl TriangularMatrix {
    /// An `n x n` symmetric matrix of zeros.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * (n + 1) / 2],
        }
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.data[mr(i, i)] = 1.0;
        }
        m
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Element `(i, j)`, in either index order.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[mp(i, j)]
    }

    /// Mutable element `(i, j)`; requires `i <= j`.
    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.data[mr(i, j)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangular_indexing() {
        assert_eq!(mr(0, 0), 0);
        assert_eq!(mr(0, 1), 1);
        assert_eq!(mr(1, 1), 2);
        assert_eq!(mr(0, 2), 3);
        assert_eq!(mr(2, 2), 5);
        assert_eq!(mp(2, 0), mr(0, 2));
        assert_eq!(mp(0, 2), mr(0, 2));
    }

    #[test]
    fn test_identity() {
        let m = TriangularMatrix::identity(4);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(m.get(i, j), expected);
            }
        }
    }

    #[test]
    fn test_symmetric_access() {
        let mut m = TriangularMatrix::zeros(3);
        *m.get_mut(0, 2) = 4.5;
        assert_eq!(m.get(0, 2), 4.5);
        assert_eq!(m.get(2, 0), 4.5);
    }
}
