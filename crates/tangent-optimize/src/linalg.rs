//! Dense linear solves for small symmetric systems.

use ndarray::Array2;

/// A pivot fell below the relative tolerance during elimination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Singular {
    /// Column at which elimination stopped
    pub column: usize,
    /// Pivot magnitude relative to the largest entry of the matrix
    pub relative_pivot: f64,
}

/// Solve `A X = B` by Gauss-Jordan elimination with partial pivoting.
///
/// `a` must be square with as many rows as `b`. A pivot smaller than
/// `tolerance * max|a_ij|` is reported as [`Singular`]. A zero-column `b`
/// only checks `a` for singularity.
pub fn solve(a: &Array2<f64>, b: &Array2<f64>, tolerance: f64) -> Result<Array2<f64>, Singular> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert_eq!(n, b.nrows());

    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if n > 0 && (scale == 0.0 || !scale.is_finite()) {
        return Err(Singular {
            column: 0,
            relative_pivot: 0.0,
        });
    }

    let mut lhs = a.to_owned();
    let mut rhs = b.to_owned();

    for col in 0..n {
        let (pivot_row, pivot) = (col..n)
            .map(|row| (row, lhs[[row, col]].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        let relative_pivot = pivot / scale;
        if relative_pivot < tolerance || !relative_pivot.is_finite() {
            return Err(Singular {
                column: col,
                relative_pivot,
            });
        }

        if pivot_row != col {
            swap_rows(&mut lhs, pivot_row, col);
            swap_rows(&mut rhs, pivot_row, col);
        }

        let diag = lhs[[col, col]];
        lhs.row_mut(col).mapv_inplace(|v| v / diag);
        rhs.row_mut(col).mapv_inplace(|v| v / diag);

        let lhs_pivot = lhs.row(col).to_owned();
        let rhs_pivot = rhs.row(col).to_owned();
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = lhs[[row, col]];
            if factor != 0.0 {
                lhs.row_mut(row).scaled_add(-factor, &lhs_pivot);
                rhs.row_mut(row).scaled_add(-factor, &rhs_pivot);
            }
        }
    }

    Ok(rhs)
}

fn swap_rows(m: &mut Array2<f64>, i: usize, j: usize) {
    let (mut first, mut second) = m.multi_slice_mut((ndarray::s![i, ..], ndarray::s![j, ..]));
    ndarray::Zip::from(&mut first).and(&mut second).for_each(std::mem::swap);
}

/// `(m + mᵀ) / 2`.
pub fn symmetric_part(m: &Array2<f64>) -> Array2<f64> {
    (m + &m.t()) / 2.0
}
