use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::features::{fourier_terms, ANNUAL_PERIOD_DAYS};
use crate::types::{ForecastInterval, ObservationSeries};

const WEEKLY_PERIOD_DAYS: f64 = 7.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalParams {
    /// Fourier pairs for the annual cycle
    pub yearly_order: usize,
    /// Fourier pairs for the weekly cycle
    pub weekly_order: usize,
    /// L2 penalty on the seasonal coefficients (trend terms are unpenalized)
    pub ridge: f64,
    /// Nominal coverage of the `yhat ± z·sigma` interval
    pub interval_width: f64,
}

impl Default for SeasonalParams {
    fn default() -> Self {
        Self {
            yearly_order: 10,
            weekly_order: 3,
            ridge: 0.1,
            interval_width: 0.8,
        }
    }
}

impl SeasonalParams {
    pub fn n_regressors(&self) -> usize {
        2 + 2 * self.yearly_order + 2 * self.weekly_order
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.weekly_order > 3 {
            errors.push("seasonal.weekly_order must be <= 3 for a 7-day period".to_string());
        }
        if !(self.ridge >= 0.0 && self.ridge.is_finite()) {
            errors.push("seasonal.ridge must be a finite value >= 0".to_string());
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            errors.push("seasonal.interval_width must be in (0, 1)".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Additive trend + annual + weekly seasonality fitted by least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalModel {
    params: SeasonalParams,
    start: NaiveDate,
    t_scale: f64,
    y_scale: f64,
    coefficients: Vec<f64>,
    /// Residual standard deviation on the count scale
    sigma: f64,
}

impl SeasonalModel {
    pub fn fit(series: &ObservationSeries, params: &SeasonalParams) -> Result<Self> {
        let p = params.n_regressors();
        let (start, end) = match (series.first_date(), series.last_date()) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(ForecastError::Training("empty observation series".to_string())),
        };
        if series.len() <= p {
            return Err(ForecastError::insufficient_history(
                end,
                format!("{} observations for {} seasonal regressors", series.len(), p),
            ));
        }

        let t_scale = ((end - start).num_days() as f64).max(1.0);
        let counts = series.counts();
        let y_scale = counts.iter().cloned().fold(0.0, f64::max).max(1.0);

        let mut model = Self {
            params: params.clone(),
            start,
            t_scale,
            y_scale,
            coefficients: Vec::new(),
            sigma: 0.0,
        };

        let x = model.design_matrix(&series.dates());
        let y = Array1::from_iter(counts.iter().map(|c| c / y_scale));

        let mut xtx = x.t().dot(&x);
        for j in 2..p {
            xtx[[j, j]] += params.ridge;
        }
        let xty = x.t().dot(&y);
        let beta = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            ForecastError::Training("seasonal design matrix is not positive definite".to_string())
        })?;
        model.coefficients = beta.to_vec();

        let fitted = x.dot(&beta);
        let residuals: Vec<f64> = counts
            .iter()
            .zip(fitted.iter())
            .map(|(actual, f)| actual - f * y_scale)
            .collect();
        let dof = (residuals.len() - p).max(1) as f64;
        model.sigma = (residuals.iter().map(|r| r * r).sum::<f64>() / dof).sqrt();

        info!(
            "Seasonal model fitted on {} days ({} to {}), residual sigma {:.2}",
            series.len(),
            start,
            end,
            model.sigma
        );

        Ok(model)
    }

    fn design_matrix(&self, dates: &[NaiveDate]) -> Array2<f64> {
        let p = self.params.n_regressors();
        let mut x = Array2::zeros((dates.len(), p));
        for (i, date) in dates.iter().enumerate() {
            let offset = (*date - self.start).num_days() as f64;
            // Seasonal phase follows absolute day number so it is stable across fits
            let day_number = date.num_days_from_ce() as f64;

            let mut row = Vec::with_capacity(p);
            row.push(1.0);
            row.push(offset / self.t_scale);
            row.extend(fourier_terms(day_number, ANNUAL_PERIOD_DAYS, self.params.yearly_order));
            row.extend(fourier_terms(day_number, WEEKLY_PERIOD_DAYS, self.params.weekly_order));
            for (j, value) in row.into_iter().enumerate() {
                x[[i, j]] = value;
            }
        }
        x
    }

    pub fn predict_point(&self, dates: &[NaiveDate]) -> Vec<f64> {
        let beta = Array1::from_vec(self.coefficients.clone());
        self.design_matrix(dates)
            .dot(&beta)
            .iter()
            .map(|v| v * self.y_scale)
            .collect()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn predict(&self, dates: &[NaiveDate]) -> Vec<ForecastInterval> {
        let margin = z_score(self.params.interval_width) * self.sigma;
        dates
            .iter()
            .zip(self.predict_point(dates))
            .map(|(&date, yhat)| ForecastInterval {
                date,
                lower: yhat - margin,
                median: yhat,
                upper: yhat + margin,
            })
            .collect()
    }
}

/// Two-sided normal z for an interval of nominal coverage `interval_width`
fn z_score(interval_width: f64) -> f64 {
    inverse_normal_cdf((1.0 + interval_width) / 2.0)
}

/// Standard normal quantile via Acklam's rational approximation
fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
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

/// Solve A x = b for symmetric positive-definite A
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}
