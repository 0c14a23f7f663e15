//! Small dense linear algebra for the forecaster's normal equations.
//!
//! Matrices are row-major `Vec<f64>` of size `n * n`. The systems solved here
//! have a few dozen unknowns at most.

/// Pivots smaller than this are treated as zero.
const PIVOT_EPS: f64 = 1e-12;

/// Ridge least squares: minimize `|X b - y|^2 + ridge * |b[skip..]|^2`.
///
/// `design` holds one feature row per observation. The first `skip`
/// coefficients (intercept) are not penalized. Returns `None` if the system
/// is singular.
pub fn ridge_least_squares(
    design: &[Vec<f64>],
    y: &[f64],
    ridge: f64,
    skip: usize,
) -> Option<Vec<f64>> {
    let p = design.first()?.len();
    let mut gram = vec![0.0; p * p];
    let mut rhs = vec![0.0; p];

    for (row, &target) in design.iter().zip(y) {
        for i in 0..p {
            rhs[i] += row[i] * target;
            for j in i..p {
                gram[i * p + j] += row[i] * row[j];
            }
        }
    }
    // Mirror the upper triangle
    for i in 0..p {
        for j in 0..i {
            gram[i * p + j] = gram[j * p + i];
        }
    }
    for i in skip..p {
        gram[i * p + i] += ridge;
    }

    solve(gram, rhs, p)
}

/// Gaussian elimination with partial pivoting.
pub fn solve(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> Option<Vec<f64>> {
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            a[r1 * n + col]
                .abs()
                .total_cmp(&a[r2 * n + col].abs())
        })?;
        let pivot = a[pivot_row * n + col];
        if !pivot.is_finite() || pivot.abs() < PIVOT_EPS {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                a.swap(col * n + j, pivot_row * n + j);
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = a[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[row * n + j] -= factor * a[col * n + j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for j in (row + 1)..n {
            sum -= a[row * n + j] * x[j];
        }
        x[row] = sum / a[row * n + row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Inverse standard normal CDF (Acklam's rational approximation).
///
/// Relative error is below 1.2e-9 over (0, 1). Returns NaN outside it.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 || p.is_nan() {
        return f64::NAN;
    }

    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239e0,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838e0,
        -2.549732539343734e0,
        4.374664141464968e0,
        2.938163982698783e0,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996e0,
        3.754408661907416e0,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
