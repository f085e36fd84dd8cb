use super::special::student_t_two_sided_p;
use ndarray::ArrayView1;

/// Pearson correlation coefficient with its two-sided significance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
}

impl Correlation {
    pub const UNDEFINED: Self = Self {
        coefficient: f64::NAN,
        p_value: f64::NAN,
    };
}

/// Pearson's r between `x` and `y`, tested against zero with a t statistic on
/// `n - 2` degrees of freedom.
///
/// Fewer than two points, or a constant input, leaves the correlation undefined.
/// Two distinct points are always perfectly correlated and carry no evidence, so
/// they report `r = ±1` with `p = 1`.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Correlation {
    assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return Correlation::UNDEFINED;
    }

    let mean_x = x.sum() / n as f64;
    let mean_y = y.sum() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Correlation::UNDEFINED;
    }

    if n == 2 {
        return Correlation {
            coefficient: sxy.signum(),
            p_value: 1.0,
        };
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let p_value = if r.abs() == 1.0 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        student_t_two_sided_p(t, df)
    };
    Correlation {
        coefficient: r,
        p_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn matches_reference_values() {
        let result = pearson(array![1.0, 2.0, 3.0, 4.0, 5.0].view(), array![2.0, 1.0, 4.0, 3.0, 5.0].view());
        assert_relative_eq!(result.coefficient, 0.8, epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 0.104_088_038_661_827_8, epsilon = 1e-9);
    }

    #[test]
    fn four_points_two_degrees_of_freedom() {
        let result = pearson(array![1.0, 2.0, 3.0, 4.0].view(), array![1.0, 3.0, 2.0, 4.0].view());
        assert_relative_eq!(result.coefficient, 0.8, epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn perfect_negative_correlation() {
        let result = pearson(array![1.0, 2.0, 3.0].view(), array![6.0, 4.0, 2.0].view());
        assert_relative_eq!(result.coefficient, -1.0, epsilon = 1e-12);
        assert_eq!(result.p_value, 0.0);
    }

    #[test]
    fn constant_or_short_inputs_are_undefined() {
        let constant = pearson(array![1.0, 1.0, 1.0].view(), array![1.0, 2.0, 3.0].view());
        assert!(constant.coefficient.is_nan() && constant.p_value.is_nan());
        let single = pearson(array![1.0].view(), array![2.0].view());
        assert!(single.coefficient.is_nan() && single.p_value.is_nan());
        let flat_pair = pearson(array![1.0, 1.0].view(), array![2.0, 3.0].view());
        assert!(flat_pair.coefficient.is_nan() && flat_pair.p_value.is_nan());
    }

    #[test]
    fn two_points_are_perfectly_correlated_without_evidence() {
        let falling = pearson(array![1.0, 2.0].view(), array![2.0, 1.0].view());
        assert_eq!(falling.coefficient, -1.0);
        assert_eq!(falling.p_value, 1.0);
        let rising = pearson(array![0.2, 0.7].view(), array![10.0, 30.0].view());
        assert_eq!(rising.coefficient, 1.0);
        assert_eq!(rising.p_value, 1.0);
    }
}
