use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::{ForecastError, Result};

/// Name of the intercept column
pub const INTERCEPT: &str = "const";

const COLLINEARITY_TOLERANCE: f64 = 1e-10;

/// A named design matrix under construction. An intercept column is always first.
#[derive(Debug, Clone)]
pub struct Design {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl Design {
    pub fn with_intercept(n_rows: usize) -> Self {
        Self {
            names: vec![INTERCEPT.to_string()],
            columns: vec![vec![1.0; n_rows]],
            n_rows,
        }
    }

    /// Append a named regressor column
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(ForecastError::Schema(format!(
                "regressor '{}' has {} values for {} rows",
                name,
                values.len(),
                self.n_rows
            )));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Adds one 0/1 column per distinct category except the smallest.
    pub fn push_dummies<K>(&mut self, prefix: &str, categories: &[K]) -> Result<()>
    where
        K: Ord + Copy + std::fmt::Display,
    {
        let mut levels: Vec<K> = categories.to_vec();
        levels.sort();
        levels.dedup();
        for level in levels.into_iter().skip(1) {
            let column = categories.iter().map(|c| if *c == level { 1.0 } else { 0.0 }).collect();
            self.push(format!("{}_{}", prefix, level), column)?;
        }
        Ok(())
    }

    pub fn n_regressors(&self) -> usize {
        self.names.len()
    }

    /// Column names in design order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_rows, self.columns.len(), |i, j| self.columns[j][i])
    }
}

/// One estimate with its robust standard error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub p_value: f64,
}

/// Fitted OLS model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub n_obs: usize,
}

impl OlsFit {
    /// Look up a coefficient by column name
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn estimate(&self, name: &str) -> Option<f64> {
        self.coefficient(name).map(|c| c.estimate)
    }

    /// Estimates whose name starts with `prefix`, e.g. all `month_` dummies.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Coefficient> + 'a {
        self.coefficients.iter().filter(move |c| c.name.starts_with(prefix))
    }
}

/// Fit `y = X b` by least squares with HC1 robust standard errors.
///
/// Requires strictly more observations than regressors; the HC1 correction
/// `n / (n - k)` is undefined otherwise.
pub fn fit_ols(y: &[f64], design: &Design, context: &str) -> Result<OlsFit> {
    let n = y.len();
    let k = design.n_regressors();
    if n != design.n_rows {
        return Err(ForecastError::Schema(format!(
            "{}: {} responses for {} design rows",
            context, n, design.n_rows
        )));
    }
    if n <= k {
        return Err(ForecastError::insufficient(context, n, k + 1));
    }

    let x = design.matrix();
    let y = DVector::from_column_slice(y);

    let xtx = x.transpose() * &x;
    // A pivot that has lost almost all of its diagonal mass means the column
    // is (numerically) a combination of the ones before it.
    let xtx_inv = xtx
        .clone()
        .cholesky()
        .filter(|c| {
            let l = c.l();
            (0..k).all(|j| l[(j, j)].powi(2) > COLLINEARITY_TOLERANCE * xtx[(j, j)])
        })
        .map(|c| c.inverse())
        .ok_or_else(|| {
            ForecastError::SingularDesign(format!(
                "{}: regressors [{}] are collinear",
                context,
                design.names.join(", ")
            ))
        })?;

    let beta = &xtx_inv * (x.transpose() * &y);
    let residuals = &y - &x * &beta;

    // HC1: (X'X)^-1 X' diag(e^2) X (X'X)^-1 * n/(n-k)
    let scaled = DMatrix::from_fn(n, k, |i, j| x[(i, j)] * residuals[i]);
    let meat = scaled.transpose() * &scaled;
    let covariance = &xtx_inv * meat * &xtx_inv * (n as f64 / (n - k) as f64);

    let mean_y = y.mean();
    let ss_total: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let ss_resid: f64 = residuals.iter().map(|e| e * e).sum();
    let r_squared = if ss_total > 0.0 { 1.0 - ss_resid / ss_total } else { 0.0 };

    let coefficients = design
        .names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let std_error = covariance[(j, j)].max(0.0).sqrt();
            Coefficient {
                name: name.clone(),
                estimate: beta[j],
                std_error,
                p_value: normal_two_sided_p(beta[j], std_error),
            }
        })
        .collect();

    Ok(OlsFit {
        coefficients,
        r_squared,
        n_obs: n,
    })
}

fn normal_two_sided_p(estimate: f64, std_error: f64) -> f64 {
    if std_error > 0.0 {
        erfc((estimate / std_error).abs() / std::f64::consts::SQRT_2)
    } else {
        f64::NAN
    }
}

/// Significance stars in the usual 0.001 / 0.01 / 0.05 bands.
pub fn stars(p_value: f64) -> &'static str {
    if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();
        let mut design = Design::with_intercept(x.len());
        design.push("x", x).unwrap();

        let fit = fit_ols(&y, &design, "line").unwrap();
        assert!((fit.estimate(INTERCEPT).unwrap() - 3.0).abs() < 1e-9);
        assert!((fit.estimate("x").unwrap() - 2.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(fit.n_obs, 20);
    }

    #[test]
    fn test_noisy_fit_has_positive_errors() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.0 + 0.5 * v + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect();
        let mut design = Design::with_intercept(x.len());
        design.push("x", x).unwrap();

        let fit = fit_ols(&y, &design, "noisy").unwrap();
        let slope = fit.coefficient("x").unwrap();
        assert!((slope.estimate - 0.5).abs() < 0.05);
        assert!(slope.std_error > 0.0);
        assert!(slope.p_value < 0.001);
        assert!(fit.r_squared > 0.9 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_too_few_observations() {
        let mut design = Design::with_intercept(2);
        design.push("x", vec![1.0, 2.0]).unwrap();
        let result = fit_ols(&[1.0, 2.0], &design, "tiny");
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData { observations: 2, required: 3, .. })
        ));
    }

    #[test]
    fn test_collinear_regressors_are_reported() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let doubled: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        let y: Vec<f64> = x.iter().map(|v| v + 1.0).collect();
        let mut design = Design::with_intercept(10);
        design.push("x", x).unwrap();
        design.push("x2", doubled).unwrap();
        assert!(matches!(fit_ols(&y, &design, "collinear"), Err(ForecastError::SingularDesign(_))));
    }

    #[test]
    fn test_dummies_drop_first_level() {
        let months = [3u32, 1, 2, 1, 3];
        let mut design = Design::with_intercept(months.len());
        design.push_dummies("month", &months).unwrap();
        assert_eq!(design.names(), &["const", "month_2", "month_3"]);
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(0.0001), "***");
        assert_eq!(stars(0.03), "*");
        assert_eq!(stars(0.2), "");
    }
}
