//! Linear system solvers.
//!
//! One entry point, [`solve`], works for real and complex systems and
//! chooses between dense LU with partial pivoting (nalgebra) and sparse
//! column-compressed LU (faer). Singularity never panics: it comes back
//! as [`Error::Singular`], and a solution containing NaN counts as
//! unsolved too, since a structurally singular factorization can produce
//! garbage instead of failing outright.

use faer::prelude::*;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{ComplexField, DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Scalar types the linear layer accepts.
pub trait LinearScalar: ComplexField + Copy {
    /// Is any component of this value NaN?
    fn is_nan(self) -> bool;

    /// Solve `Ax = z` by sparse LU, with `A` given as triplets.
    fn solve_sparse(
        size: usize,
        triplets: &[(usize, usize, Self)],
        rhs: &DVector<Self>,
    ) -> Result<DVector<Self>>;
}

impl LinearScalar for f64 {
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }

    fn solve_sparse(
        size: usize,
        triplets: &[(usize, usize, f64)],
        rhs: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, v))
            .collect();

        let sparse_mat =
            SparseColMat::<usize, f64>::try_new_from_triplets(size, size, &faer_triplets)
                .map_err(|_| Error::Singular)?;
        let lu = sparse_mat.sp_lu().map_err(|_| Error::Singular)?;

        let faer_rhs = Col::<f64>::from_fn(size, |i| rhs[i]);
        let faer_x = lu.solve(&faer_rhs);

        Ok(DVector::from_fn(size, |i, _| faer_x[i]))
    }
}

impl LinearScalar for Complex64 {
    fn is_nan(self) -> bool {
        self.re.is_nan() || self.im.is_nan()
    }

    fn solve_sparse(
        size: usize,
        triplets: &[(usize, usize, Complex64)],
        rhs: &DVector<Complex64>,
    ) -> Result<DVector<Complex64>> {
        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, c64::new(v.re, v.im)))
            .collect();

        let sparse_mat =
            SparseColMat::<usize, c64>::try_new_from_triplets(size, size, &faer_triplets)
                .map_err(|_| Error::Singular)?;
        let lu = sparse_mat.sp_lu().map_err(|_| Error::Singular)?;

        let faer_rhs = Col::<c64>::from_fn(size, |i| c64::new(rhs[i].re, rhs[i].im));
        let faer_x = lu.solve(&faer_rhs);

        Ok(DVector::from_fn(size, |i, _| {
            Complex64::new(faer_x[i].re, faer_x[i].im)
        }))
    }
}

/// Solve `Ax = z`, dense or sparse.
///
/// The sparse path extracts the non-zero triplets from the assembled
/// matrix and factors them with faer; the dense path uses LU with
/// partial pivoting.
pub fn solve<T: LinearScalar>(a: &DMatrix<T>, z: &DVector<T>, sparse: bool) -> Result<DVector<T>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    if a.nrows() != z.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: z.len(),
        });
    }

    let x = if sparse {
        let mut triplets = Vec::new();
        for j in 0..a.ncols() {
            for i in 0..a.nrows() {
                let v = a[(i, j)];
                if v != T::zero() {
                    triplets.push((i, j, v));
                }
            }
        }
        T::solve_sparse(a.nrows(), &triplets, z)?
    } else {
        a.clone().lu().solve(z).ok_or(Error::Singular)?
    };

    // NaN anywhere means the factorization went through a structurally
    // singular system
    if x.iter().any(|v| v.is_nan()) {
        return Err(Error::Singular);
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn dense_solves_a_small_system() {
        // 2x + y = 5
        // x + 3y = 6
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let z = dvector![5.0, 6.0];

        let x = solve(&a, &z, false).unwrap();
        assert!((x[0] - 1.8).abs() < 1e-10);
        assert!((x[1] - 1.4).abs() < 1e-10);
    }

    #[test]
    fn sparse_matches_dense() {
        let size = 20;
        let a = DMatrix::from_fn(size, size, |i, j| {
            if i == j {
                size as f64 + 1.0
            } else {
                1.0 / ((i as f64 - j as f64).abs() + 1.0)
            }
        });
        let z = DVector::from_fn(size, |i, _| (i + 1) as f64);

        let dense = solve(&a, &z, false).unwrap();
        let sparse = solve(&a, &z, true).unwrap();
        for i in 0..size {
            assert!(
                (dense[i] - sparse[i]).abs() < 1e-10,
                "mismatch at {i}: dense={}, sparse={}",
                dense[i],
                sparse[i]
            );
        }
    }

    #[test]
    fn singular_matrix_is_an_error_not_a_panic() {
        let a = dmatrix![1.0, 2.0; 2.0, 4.0];
        let z = dvector![1.0, 2.0];
        assert!(matches!(solve(&a, &z, false), Err(Error::Singular)));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let a = dmatrix![1.0, 2.0; 3.0, 4.0];
        let z = dvector![1.0, 2.0, 3.0];
        assert!(matches!(
            solve(&a, &z, false),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn complex_system_through_the_same_path() {
        // (2+i)x + y = 5+i
        // x + (3-i)y = 6
        let a = dmatrix![
            Complex64::new(2.0, 1.0), Complex64::new(1.0, 0.0);
            Complex64::new(1.0, 0.0), Complex64::new(3.0, -1.0)
        ];
        let z = dvector![Complex64::new(5.0, 1.0), Complex64::new(6.0, 0.0)];

        for sparse in [false, true] {
            let x = solve(&a, &z, sparse).unwrap();
            let r0 = a[(0, 0)] * x[0] + a[(0, 1)] * x[1] - z[0];
            let r1 = a[(1, 0)] * x[0] + a[(1, 1)] * x[1] - z[1];
            assert!(r0.norm() < 1e-10, "residual {r0} (sparse={sparse})");
            assert!(r1.norm() < 1e-10, "residual {r1} (sparse={sparse})");
        }
    }

    #[test]
    fn solver_identity_holds_for_a_random_ish_system() {
        // ||A * solve(A, z) - z|| stays small relative to ||z||
        let size = 12;
        let a = DMatrix::from_fn(size, size, |i, j| {
            ((i * 7 + j * 13) % 17) as f64 / 17.0 + if i == j { 4.0 } else { 0.0 }
        });
        let z = DVector::from_fn(size, |i, _| ((i * 5) % 11) as f64 - 5.0);

        let x = solve(&a, &z, false).unwrap();
        let residual = (&a * &x - &z).norm();
        assert!(residual <= 1e-10 * z.norm().max(1.0), "residual {residual}");
    }
}
