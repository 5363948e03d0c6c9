use ndarray::{Array1, Array2};
use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
};

/// How tied event times enter the partial likelihood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieMethod {
    /// Efron's approximation, the coxph default
    #[default]
    Efron,
    /// Breslow's approximation, every tied death sees the full risk set
    Breslow,
}

/// Configuration for the Newton-Raphson fit
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub ties: TieMethod,
    pub max_iterations: usize,
    /// relative change in log partial likelihood that counts as converged
    pub tolerance: f64,
    pub max_step_halvings: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            ties: TieMethod::Efron,
            max_iterations: 20,
            tolerance: 1e-9,
            max_step_halvings: 10,
        }
    }
}

/// Log partial likelihood with its first and second derivatives at some beta
#[derive(Debug, Clone)]
pub struct PartialLikelihood {
    pub loglik: f64,
    pub gradient: Array1<f64>,
    pub hessian: Array2<f64>,
}

/// Where the optimizer ended up
#[derive(Debug, Clone)]
pub struct Convergence {
    pub beta: Array1<f64>,
    pub loglik: f64,
    /// log partial likelihood at beta = 0
    pub loglik_null: f64,
    /// observed information (negative hessian) at `beta`
    pub information: Array2<f64>,
    pub iterations: usize,
}

/// Cox proportional hazards optimizer (unpenalized Newton-Raphson)
pub struct CoxOptimizer {
    config: OptimizationConfig,
}

impl CoxOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    /// Maximize the log partial likelihood starting from beta = 0
    pub fn optimize(&self, data: &SurvivalData) -> Result<Convergence> {
        if data.n_events() == 0 {
            return Err(SurvivalError::invalid_survival_data(
                "no events observed - partial likelihood is flat",
            ));
        }

        let mut beta = Array1::zeros(data.n_features());
        let mut current = self.likelihood_derivatives(data, &beta)?;
        let loglik_null = current.loglik;

        for iteration in 1..=self.config.max_iterations {
            let information = current.hessian.mapv(|h| -h);
            let full_step = solve_linear_system(&information, &current.gradient)?;

            let mut step = full_step;
            let mut candidate = &beta + &step;
            let mut next = self.likelihood_derivatives(data, &candidate);

            // at the optimum the full step moves loglik by rounding noise only,
            // so the convergence test runs before any halving
            if let Ok(full) = &next {
                if full.loglik.is_finite()
                    && relative_change(current.loglik, full.loglik) <= self.config.tolerance
                {
                    return Ok(Convergence {
                        information: full.hessian.mapv(|h| -h),
                        beta: candidate,
                        loglik: full.loglik,
                        loglik_null,
                        iterations: iteration,
                    });
                }
            }

            // step halving whenever the likelihood goes the wrong way
            let mut halvings = 0;
            while !accepts(&next, current.loglik) {
                if halvings == self.config.max_step_halvings {
                    return Err(SurvivalError::optimization_failed(format!(
                        "step halving exhausted at iteration {}",
                        iteration
                    )));
                }
                step.mapv_inplace(|s| s * 0.5);
                candidate = &beta + &step;
                next = self.likelihood_derivatives(data, &candidate);
                halvings += 1;
            }
            let next = next?;

            let converged = relative_change(current.loglik, next.loglik) <= self.config.tolerance;
            beta = candidate;
            current = next;

            if converged {
                return Ok(Convergence {
                    information: current.hessian.mapv(|h| -h),
                    beta,
                    loglik: current.loglik,
                    loglik_null,
                    iterations: iteration,
                });
            }
        }

        Err(SurvivalError::optimization_failed(format!(
            "Newton-Raphson failed to converge in {} iterations",
            self.config.max_iterations
        )))
    }

    /// Compute log partial likelihood and its derivatives
    pub fn likelihood_derivatives(
        &self,
        data: &SurvivalData,
        beta: &Array1<f64>,
    ) -> Result<PartialLikelihood> {
        let n_features = data.n_features();
        if beta.len() != n_features {
            return Err(SurvivalError::invalid_dimensions(format!(
                "beta len ({}) != n_features ({})",
                beta.len(),
                n_features
            )));
        }

        let covariates = data.covariates();
        let linear_pred = covariates.dot(beta);
        let risk = linear_pred.mapv(f64::exp);
        if risk.iter().any(|r| !r.is_finite()) {
            return Err(SurvivalError::numerical_error("risk score overflowed"));
        }

        let mut loglik = 0.0;
        let mut gradient = Array1::zeros(n_features);
        let mut hessian = Array2::zeros((n_features, n_features));

        for stratum in data.strata() {
            let (s0, s1, s2) = weighted_sums(data, &risk, &stratum.at_risk);
            let (d0, d1, d2) = weighted_sums(data, &risk, &stratum.deaths);

            for &i in &stratum.deaths {
                loglik += linear_pred[i];
                gradient += &covariates.row(i);
            }

            let n_deaths = stratum.n_deaths() as f64;
            for l in 0..stratum.n_deaths() {
                let fraction = match self.config.ties {
                    TieMethod::Efron => l as f64 / n_deaths,
                    TieMethod::Breslow => 0.0,
                };

                let t0 = s0 - fraction * d0;
                if !(t0 > 0.0) || !t0.is_finite() {
                    return Err(SurvivalError::numerical_error("Risk set sum is non-positive"));
                }
                let t1 = &s1 - &(fraction * &d1);
                let t2 = &s2 - &(fraction * &d2);

                loglik -= t0.ln();
                let mean = &t1 / t0;
                gradient -= &mean;
                for j in 0..n_features {
                    for k in 0..n_features {
                        hessian[[j, k]] -= t2[[j, k]] / t0 - mean[j] * mean[k];
                    }
                }
            }
        }

        Ok(PartialLikelihood { loglik, gradient, hessian })
    }
}

fn accepts(next: &Result<PartialLikelihood>, current_loglik: f64) -> bool {
    // a few ulps of slack; halving can't fix a dip that small
    let slack = 4.0 * f64::EPSILON * current_loglik.abs();
    match next {
        Ok(pl) => pl.loglik.is_finite() && pl.loglik >= current_loglik - slack,
        Err(_) => false,
    }
}

fn relative_change(old: f64, new: f64) -> f64 {
    if new == 0.0 {
        (new - old).abs()
    } else {
        (1.0 - old / new).abs()
    }
}

/// sum of w, w*x and w*x*x' over a set of samples
fn weighted_sums(
    data: &SurvivalData,
    risk: &Array1<f64>,
    members: &[usize],
) -> (f64, Array1<f64>, Array2<f64>) {
    let n_features = data.n_features();
    let covariates = data.covariates();
    let mut sum = 0.0;
    let mut first = Array1::zeros(n_features);
    let mut second = Array2::zeros((n_features, n_features));

    for &i in members {
        let w = risk[i];
        let row = covariates.row(i);
        sum += w;
        first.scaled_add(w, &row);
        for j in 0..n_features {
            for k in 0..n_features {
                second[[j, k]] += w * row[j] * row[k];
            }
        }
    }

    (sum, first, second)
}

/// Solve linear system Ax = b by gaussian elimination w/ partial pivoting
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(SurvivalError::invalid_dimensions("Matrix dimensions mismatch"));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    // Forward elimination
    for i in 0..n {
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(SurvivalError::numerical_error("Matrix is singular"));
        }

        if max_row != i {
            for j in 0..n {
                a_copy.swap([i, j], [max_row, j]);
            }
            b_copy.swap(i, max_row);
        }

        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

/// Invert a square matrix column by column
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut inverse = Array2::zeros((n, n));
    for j in 0..n {
        let mut unit = Array1::zeros(n);
        unit[j] = 1.0;
        let column = solve_linear_system(a, &unit)?;
        inverse.column_mut(j).assign(&column);
    }
    Ok(inverse)
}
