//! Accelerated projected gradient for `min xᵀΣx` over a convex set.

use ndarray::Array1;

/// Bisection steps for the budget-constraint multiplier.
const BISECTION_STEPS: usize = 200;

/// Solver settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverSettings {
    pub(crate) max_iterations: usize,
    pub(crate) tolerance: f64,
}

/// Outcome of a solve.
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub(crate) x: Array1<f64>,
    pub(crate) iterations: usize,
    pub(crate) converged: bool,
}

/// FISTA with gradient-based adaptive restart.
///
/// `lipschitz` bounds the gradient `2Σx`, i.e. `2 λ_max(Σ)`. `project` must
/// map any point onto the feasible set, and `x0` must be feasible.
pub(crate) fn fista<F>(
    sigma: &ndarray::Array2<f64>,
    x0: Array1<f64>,
    lipschitz: f64,
    settings: SolverSettings,
    project: F,
) -> Solution
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    // A zero matrix makes every feasible point optimal; any step works.
    let step = if lipschitz > 0.0 { 1.0 / lipschitz } else { 1.0 };

    let mut x = x0;
    let mut y = x.clone();
    let mut t = 1.0_f64;

    for iteration in 1..=settings.max_iterations {
        let gradient = sigma.dot(&y) * 2.0;
        let next = project(&(&y - &(gradient * step)));

        let moved = (&next - &x).iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        if moved <= settings.tolerance {
            return Solution {
                x: next,
                iterations: iteration,
                converged: true,
            };
        }

        // Restart momentum when it points uphill.
        if (&y - &next).dot(&(&next - &x)) > 0.0 {
            t = 1.0;
            y = next.clone();
        } else {
            let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
            y = &next + &((&next - &x) * ((t - 1.0) / t_next));
            t = t_next;
        }
        x = next;
    }

    Solution {
        x,
        iterations: settings.max_iterations,
        converged: false,
    }
}

/// Euclidean projection onto the probability simplex (sort-based).
pub(crate) fn project_simplex(v: &Array1<f64>) -> Array1<f64> {
    let n = v.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (i as f64 + 1.0);
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.mapv(|x| (x - theta).max(0.0))
}

/// Euclidean projection onto `{y ≥ 0, aᵀy = 1}`.
///
/// The solution is `max(v + λa, 0)` where `λ` makes the budget hold;
/// `aᵀ max(v + λa, 0)` is non-decreasing in `λ`, so `λ` is found by
/// bracketing and bisection. Needs at least one positive `a_i`.
pub(crate) fn project_budget(v: &Array1<f64>, a: &Array1<f64>) -> Array1<f64> {
    let shifted = |lambda: f64| {
        ndarray::Zip::from(v)
            .and(a)
            .map_collect(|vi, ai| (vi + lambda * ai).max(0.0))
    };
    let budget = |lambda: f64| shifted(lambda).dot(a);

    let mut hi = 1.0;
    while budget(hi) < 1.0 && hi < 1e300 {
        hi *= 2.0;
    }
    let mut lo = -1.0;
    while budget(lo) > 1.0 && lo > -1e300 {
        lo *= 2.0;
    }

    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if budget(mid) < 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    shifted(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_simplex_projection_of_feasible_point() {
        let v = array![0.2, 0.3, 0.5];
        let p = project_simplex(&v);
        for (a, b) in p.iter().zip(v.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_simplex_projection_clips() {
        let p = project_simplex(&array![2.0, 0.0, -1.0]);
        assert_eq!(p.to_vec(), vec![1.0, 0.0, 0.0]);

        let p = project_simplex(&array![0.5, 0.5, 0.5]);
        for x in &p {
            assert_abs_diff_eq!(*x, 1.0 / 3.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_budget_projection_satisfies_constraint() {
        let a = array![0.05, -0.01, 0.02];
        let p = project_budget(&array![1.0, 3.0, -2.0], &a);
        assert!(p.iter().all(|x| *x >= 0.0));
        assert_abs_diff_eq!(p.dot(&a), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fista_minimum_variance_two_assets() {
        // Uncorrelated variances 0.04 and 0.01: weights 0.2 / 0.8.
        let sigma = array![[0.04, 0.0], [0.0, 0.01]];
        let solution = fista(
            &sigma,
            array![0.5, 0.5],
            0.08,
            SolverSettings {
                max_iterations: 10_000,
                tolerance: 1e-12,
            },
            project_simplex,
        );
        assert!(solution.converged);
        assert_abs_diff_eq!(solution.x[0], 0.2, epsilon = 1e-8);
        assert_abs_diff_eq!(solution.x[1], 0.8, epsilon = 1e-8);
    }
}
