//! Ordinary least-squares line fitting.

/// A fitted line `y = slope * x + intercept` with its goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    /// Fitted slope.
    pub slope: f64,
    /// Fitted intercept.
    pub intercept: f64,
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
}

impl LineFit {
    /// Evaluate the fitted line at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a line to `(xs, ys)` by ordinary least squares.
///
/// The regression is centered on the means before accumulating the moment
/// sums; with unix-time abscissas in the 1e9 range the uncentered sums lose
/// most of their precision.
///
/// Returns `None` when fewer than two points are given, the slices differ in
/// length, or the x values have no spread.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    // Flat data fits itself perfectly.
    let r_squared = if syy == 0.0 {
        1.0
    } else {
        (sxy * sxy) / (sxx * syy)
    };

    Some(LineFit {
        slope,
        intercept,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_recovers_parameters() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| -0.02 * x + 95.0).collect();

        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope - -0.02).abs() < 1e-12);
        assert!((fit.intercept - 95.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn large_abscissas_stay_precise() {
        // Unix-time scale x values.
        let t0 = 1.55e9;
        let xs: Vec<f64> = (0..600).map(|i| t0 + i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| -1.5e-4 * (x - t0) + 92.0).collect();

        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope - -1.5e-4).abs() < 1e-10);
    }

    #[test]
    fn degenerate_inputs_return_none() {
        assert!(fit_line(&[1.0], &[2.0]).is_none());
        assert!(fit_line(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(fit_line(&[1.0, 2.0], &[2.0]).is_none());
    }

    #[test]
    fn noisy_fit_reports_low_r_squared() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys = [5.0, -3.0, 8.0, 1.0, -6.0, 9.0, 0.0, 4.0, -2.0, 7.0];

        let fit = fit_line(&xs, &ys).unwrap();
        assert!(fit.r_squared < 0.5);
    }
}
