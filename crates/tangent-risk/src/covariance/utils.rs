//! Eigen-decomposition and positive semi-definite repair for symmetric
//! matrices.

use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};

/// Off-diagonal magnitude below which Jacobi rotations stop.
const JACOBI_TOLERANCE: f64 = 1e-14;

/// Configuration for spectral repair
#[derive(Debug, Clone)]
pub struct PositiveDefiniteConfig {
    /// Floor applied to every eigenvalue (default: 1e-10)
    pub min_eigenvalue: f64,
    /// Whether to rescale so the trace is unchanged
    pub preserve_trace: bool,
}

impl Default for PositiveDefiniteConfig {
    fn default() -> Self {
        Self {
            min_eigenvalue: 1e-10,
            preserve_trace: false,
        }
    }
}

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Largest eigenvalue, or zero for an empty matrix.
    pub fn max_eigenvalue(&self) -> f64 {
        self.eigenvalues.iter().next().copied().unwrap_or(0.0)
    }

    /// Smallest eigenvalue, or zero for an empty matrix.
    pub fn min_eigenvalue(&self) -> f64 {
        self.eigenvalues.iter().last().copied().unwrap_or(0.0)
    }
}

/// Decompose a symmetric matrix with a rotation budget that grows with its size.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<EigenDecomposition> {
    let n = matrix.nrows();
    jacobi_eigendecomp(matrix, (30 * n * n).max(100), JACOBI_TOLERANCE)
}

/// Clip eigenvalues at `config.min_eigenvalue` and rebuild the matrix.
///
/// The result is symmetrized to remove rounding asymmetry.
pub fn enforce_positive_definite(
    cov: &Array2<f64>,
    config: &PositiveDefiniteConfig,
) -> Result<Array2<f64>> {
    let decomp = symmetric_eigen(cov)?;
    let original_trace: f64 = decomp.eigenvalues.sum();

    let mut clipped = decomp.eigenvalues.mapv(|v| v.max(config.min_eigenvalue));

    if config.preserve_trace && original_trace > 0.0 {
        let new_trace: f64 = clipped.sum();
        if new_trace > 0.0 {
            let scale = original_trace / new_trace;
            clipped.mapv_inplace(|v| v * scale);
        }
    }

    let rebuilt = reconstruct_from_eigen(&clipped, &decomp.eigenvectors)?;
    Ok(symmetrize(&rebuilt))
}

/// Whether every eigenvalue is at least `-tolerance`.
pub fn is_positive_semi_definite(matrix: &Array2<f64>, tolerance: f64) -> bool {
    matrix.is_square()
        && symmetric_eigen(matrix).is_ok_and(|decomp| decomp.min_eigenvalue() >= -tolerance)
}

/// `(M + Mᵀ) / 2`.
fn symmetrize(matrix: &Array2<f64>) -> Array2<f64> {
    (matrix + &matrix.t()) / 2.0
}

/// Jacobi eigenvalue decomposition for symmetric matrices
///
/// Each iteration zeroes the largest off-diagonal element with one rotation.
///
/// # Arguments
/// * `matrix` - Symmetric matrix to decompose
/// * `max_iterations` - Maximum number of rotations
/// * `tolerance` - Convergence tolerance for off-diagonal elements
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<EigenDecomposition> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(RiskError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(RiskError::NonFinite("eigen-decomposition input".to_string()));
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    if n > 1 {
        for _ in 0..max_iterations {
            let (p, q, max_val) = find_largest_off_diagonal(&a);
            if max_val.abs() < tolerance {
                break;
            }
            let (cos_theta, sin_theta) = compute_rotation(a[[p, p]], a[[q, q]], a[[p, q]]);
            apply_jacobi_rotation(&mut a, &mut v, p, q, cos_theta, sin_theta);
        }
    }

    let eigenvalues: Array1<f64> = a.diag().to_owned();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&i, &j| eigenvalues[j].total_cmp(&eigenvalues[i]));

    let sorted_eigenvalues = indices.iter().map(|&i| eigenvalues[i]).collect();
    let mut sorted_eigenvectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in indices.iter().enumerate() {
        sorted_eigenvectors
            .column_mut(new_idx)
            .assign(&v.column(old_idx));
    }

    Ok(EigenDecomposition {
        eigenvalues: sorted_eigenvalues,
        eigenvectors: sorted_eigenvectors,
    })
}

fn find_largest_off_diagonal(matrix: &Array2<f64>) -> (usize, usize, f64) {
    let n = matrix.nrows();
    let mut max_val = 0.0;
    let mut p = 0;
    let mut q = 1;

    for i in 0..n {
        for j in (i + 1)..n {
            let val = matrix[[i, j]].abs();
            if val > max_val {
                max_val = val;
                p = i;
                q = j;
            }
        }
    }

    (p, q, matrix[[p, q]])
}

/// Returns (cos_theta, sin_theta)
fn compute_rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    if apq.abs() < 1e-15 {
        return (1.0, 0.0);
    }

    let tau = (aqq - app) / (2.0 * apq);
    let t = if tau >= 0.0 {
        1.0 / (tau + (1.0 + tau * tau).sqrt())
    } else {
        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
    };

    let cos_theta = 1.0 / (1.0 + t * t).sqrt();
    (cos_theta, t * cos_theta)
}

fn apply_jacobi_rotation(
    a: &mut Array2<f64>,
    v: &mut Array2<f64>,
    p: usize,
    q: usize,
    cos_theta: f64,
    sin_theta: f64,
) {
    let n = a.nrows();
    let app = a[[p, p]];
    let aqq = a[[q, q]];
    let apq = a[[p, q]];

    a[[p, p]] = cos_theta * cos_theta * app - 2.0 * cos_theta * sin_theta * apq
        + sin_theta * sin_theta * aqq;
    a[[q, q]] = sin_theta * sin_theta * app
        + 2.0 * cos_theta * sin_theta * apq
        + cos_theta * cos_theta * aqq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for i in 0..n {
        if i != p && i != q {
            let aip = a[[i, p]];
            let aiq = a[[i, q]];

            a[[i, p]] = cos_theta * aip - sin_theta * aiq;
            a[[p, i]] = a[[i, p]];

            a[[i, q]] = sin_theta * aip + cos_theta * aiq;
            a[[q, i]] = a[[i, q]];
        }
    }

    for i in 0..n {
        let vip = v[[i, p]];
        let viq = v[[i, q]];

        v[[i, p]] = cos_theta * vip - sin_theta * viq;
        v[[i, q]] = sin_theta * vip + cos_theta * viq;
    }
}

/// Rebuild `V Λ Vᵀ` from eigenvalues and column eigenvectors.
pub fn reconstruct_from_eigen(
    eigenvalues: &Array1<f64>,
    eigenvectors: &Array2<f64>,
) -> Result<Array2<f64>> {
    let n = eigenvalues.len();
    if eigenvectors.nrows() != n || eigenvectors.ncols() != n {
        return Err(RiskError::DimensionMismatch {
            expected: n,
            actual: eigenvectors.nrows(),
        });
    }

    let scaled = eigenvectors * &eigenvalues.view().insert_axis(ndarray::Axis(0));
    Ok(scaled.dot(&eigenvectors.t()))
}
