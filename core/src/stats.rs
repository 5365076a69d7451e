//! Closed-form statistics over opened sums.
//!
//! Every divisor is guarded: a zero divisor yields 0, never a fault.

/// How a mean is cut to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Half away from zero
    Nearest,
    /// Toward zero; used for ratio scaling
    Truncate,
}

const DECIMALS_SCALE: f64 = 100.0;
// absorbs binary representation error before truncating (0.7 * 100 = 69.999..)
const TRUNCATE_EPSILON: f64 = 1e-9;

/// Render with exactly two fractional digits
pub fn fixed2(value: f64, rounding: Rounding) -> String {
    let scaled = value * DECIMALS_SCALE;
    let cut = match rounding {
        Rounding::Nearest => scaled.round(),
        Rounding::Truncate => (scaled + scaled.signum() * TRUNCATE_EPSILON).trunc(),
    };
    // avoid "-0.00"
    let value = if cut == 0.0 { 0.0 } else { cut / DECIMALS_SCALE };
    format!("{value:.2}")
}

pub fn mean(sum: i64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        return 0.0;
    }
    sum as f64 / divisor
}

/// Population standard deviation `sqrt(E[X²] − E[X]²)`
pub fn population_stddev(sum: i64, sum_of_squares: i64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let mean = sum as f64 / n;
    let variance = sum_of_squares as f64 / n - mean * mean;
    // float error can push a zero variance slightly negative
    variance.max(0.0).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

/// Least squares over sums:
/// `slope = (nΣxy − ΣxΣy) / (nΣx² − (Σx)²)`, `intercept = (Σy − slope·Σx) / n`.
///
/// No submitters or a zero denominator gives slope and intercept 0.
pub fn least_squares(n: usize, sum_x: i64, sum_y: i64, sum_xy: i64, sum_xx: i64) -> Regression {
    let flat = Regression {
        slope: 0.0,
        intercept: 0.0,
    };
    if n == 0 {
        return flat;
    }
    let n = n as f64;
    let (sx, sy, sxy, sxx) = (sum_x as f64, sum_y as f64, sum_xy as f64, sum_xx as f64);

    let denominator = n * sxx - sx * sx;
    if denominator == 0.0 {
        return flat;
    }
    let slope = (n * sxy - sx * sy) / denominator;
    Regression {
        slope,
        intercept: (sy - slope * sx) / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_example() {
        // [2, 4, 6]
        let (sum, squares, n) = (12, 56, 3);
        assert_eq!(fixed2(mean(sum, n as f64), Rounding::Nearest), "4.00");
        assert_eq!(
            fixed2(population_stddev(sum, squares, n), Rounding::Nearest),
            "1.63"
        );
    }

    #[test]
    fn test_regression_example() {
        // x = [1, 2, 3], y = [2, 4, 6]
        let fit = least_squares(3, 6, 12, 28, 14);
        assert_eq!(fixed2(fit.slope, Rounding::Nearest), "2.00");
        assert_eq!(fixed2(fit.intercept, Rounding::Nearest), "0.00");
    }

    #[test]
    fn test_zero_divisors() {
        assert_eq!(mean(17, 0.0), 0.0);
        assert_eq!(fixed2(mean(17, 0.0), Rounding::Truncate), "0.00");
        assert_eq!(population_stddev(5, 25, 0), 0.0);

        // constant x = 2 leaves the denominator at 0
        let fit = least_squares(3, 6, 9, 18, 12);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 0.0);
        assert_eq!(least_squares(0, 1, 2, 3, 4).intercept, 0.0);
    }

    #[test]
    fn test_truncate_vs_nearest() {
        assert_eq!(fixed2(2.0 / 3.0, Rounding::Nearest), "0.67");
        assert_eq!(fixed2(2.0 / 3.0, Rounding::Truncate), "0.66");
        assert_eq!(fixed2(0.7, Rounding::Truncate), "0.70");
        assert_eq!(fixed2(-1.239, Rounding::Truncate), "-1.23");
        assert_eq!(fixed2(-0.001, Rounding::Nearest), "0.00");
    }

    #[test]
    fn test_zero_variance_is_not_nan() {
        // [3, 3, 3]
        assert_eq!(population_stddev(9, 27, 3), 0.0);
    }
}
