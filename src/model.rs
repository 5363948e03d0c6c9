use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
    metrics::harrell_c_index,
    optimization::{invert, CoxOptimizer, OptimizationConfig, TieMethod},
};

/// two-sided 95% normal quantile
const Z_95: f64 = 1.959_963_984_540_054;

/// cox proportional hazards model (unpenalized)
#[derive(Debug, Clone)]
pub struct CoxModel {
    ties: TieMethod,                    // how tied deaths are handled
    max_iterations: usize,              // newton-raphson limit
    tolerance: f64,                     // relative loglik change for convergence
    feature_names: Option<Vec<String>>, // optional covariate labels
    summary: Option<CoxModelSummary>,   // set by fit()
}

impl Default for CoxModel {
    fn default() -> Self {
        let config = OptimizationConfig::default();
        Self {
            ties: config.ties,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            feature_names: None,
            summary: None,
        }
    }
}

impl CoxModel {
    /// new cox model w/ coxph-like defaults (efron ties, 20 iterations)
    pub fn new() -> Self {
        Self::default()
    }

    /// efron or breslow handling of tied event times
    pub fn with_ties(mut self, ties: TieMethod) -> Self {
        self.ties = ties;
        self
    }

    /// max iterations before giving up
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// how close is close enough for convergence
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// give names to covariates for nicer output
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// fit the model to data - this does the actual work
    pub fn fit(&mut self, data: &SurvivalData) -> Result<&mut Self> {
        if self.max_iterations == 0 {
            return Err(SurvivalError::invalid_parameter("max_iterations", "0"));
        }
        for feature in 0..data.n_features() {
            if data.is_constant(feature) {
                return Err(SurvivalError::invalid_survival_data(format!(
                    "covariate {} is constant - nothing to compare",
                    feature
                )));
            }
        }

        let config = OptimizationConfig {
            ties: self.ties,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..OptimizationConfig::default()
        };
        let convergence = CoxOptimizer::new(config).optimize(data)?;

        let covariance = invert(&convergence.information)?;
        let std_errors: Array1<f64> = covariance.diag().mapv(|v| v.max(0.0).sqrt());
        if std_errors.iter().any(|se| !se.is_finite()) {
            return Err(SurvivalError::numerical_error("non-finite standard errors"));
        }

        let coefficients = convergence.beta;
        let hazard_ratios = coefficients.mapv(f64::exp);
        if hazard_ratios.iter().any(|hr| !hr.is_finite() || *hr <= 0.0) {
            return Err(SurvivalError::numerical_error("hazard ratio is not finite"));
        }

        let lower_95 = (&coefficients - &(Z_95 * &std_errors)).mapv(f64::exp);
        let upper_95 = (&coefficients + &(Z_95 * &std_errors)).mapv(f64::exp);
        let z_scores = &coefficients / &std_errors;

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
        let p_values = z_scores.mapv(|z| 2.0 * (1.0 - normal.cdf(z.abs())));

        let lr_statistic = (2.0 * (convergence.loglik - convergence.loglik_null)).max(0.0);
        let lr_df = coefficients.len();
        let lr_p_value = ChiSquared::new(lr_df as f64)
            .map(|chi| 1.0 - chi.cdf(lr_statistic))
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;

        let risk_scores = data.covariates().dot(&coefficients);
        let events = data.events().to_vec();
        let concordance = harrell_c_index(risk_scores.view(), data.times(), &events).ok();

        self.summary = Some(CoxModelSummary {
            coefficients,
            std_errors,
            hazard_ratios,
            lower_95,
            upper_95,
            z_scores,
            p_values,
            loglik: convergence.loglik,
            loglik_null: convergence.loglik_null,
            lr_statistic,
            lr_df,
            lr_p_value,
            concordance,
            n_samples: data.n_samples(),
            n_events: data.n_events(),
            iterations: convergence.iterations,
            feature_names: self.feature_names.clone(),
        });

        Ok(self)
    }

    /// get the fitted coefficients (betas)
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        match &self.summary {
            Some(summary) => Ok(summary.coefficients.view()),
            None => Err(SurvivalError::invalid_parameter("model", "not fitted - call fit() first")),
        }
    }

    /// linear predictor for new samples
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;

        if covariates.ncols() != coefs.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                coefs.len(),
                covariates.ncols()
            )));
        }

        Ok(covariates.dot(&coefs))
    }

    /// relative hazards (exp of linear predictor)
    pub fn predict_hazard_ratios(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(covariates)?.mapv(f64::exp))
    }

    /// everything the fit produced
    pub fn summary(&self) -> Result<&CoxModelSummary> {
        self.summary
            .as_ref()
            .ok_or_else(|| SurvivalError::invalid_parameter("model", "not fitted - call fit() first"))
    }

    /// has this model been fit to data yet?
    pub fn is_fitted(&self) -> bool {
        self.summary.is_some()
    }
}

/// what a cox fit learned, laid out like coxph's summary
#[derive(Debug, Clone, PartialEq)]
pub struct CoxModelSummary {
    pub coefficients: Array1<f64>,  // the betas
    pub std_errors: Array1<f64>,    // sqrt(diag(I^-1))
    pub hazard_ratios: Array1<f64>, // exp(betas)
    pub lower_95: Array1<f64>,
    pub upper_95: Array1<f64>,
    pub z_scores: Array1<f64>,      // wald z
    pub p_values: Array1<f64>,      // wald, two-sided
    pub loglik: f64,
    pub loglik_null: f64,
    pub lr_statistic: f64,
    pub lr_df: usize,
    pub lr_p_value: f64,
    pub concordance: Option<f64>,
    pub n_samples: usize,
    pub n_events: usize,
    pub iterations: usize,
    pub feature_names: Option<Vec<String>>,
}

impl CoxModelSummary {
    fn feature_name(&self, i: usize) -> String {
        self.feature_names
            .as_ref()
            .and_then(|names| names.get(i).cloned())
            .unwrap_or_else(|| format!("x{}", i))
    }
}

impl fmt::Display for CoxModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "n = {}, number of events = {}", self.n_samples, self.n_events)?;
        writeln!(
            f,
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "covariate", "coef", "exp(coef)", "se(coef)", "z", "p"
        )?;
        for i in 0..self.coefficients.len() {
            writeln!(
                f,
                "{:<20} {:>10.4} {:>10.4} {:>10.4} {:>10.3} {:>10.3e}",
                self.feature_name(i),
                self.coefficients[i],
                self.hazard_ratios[i],
                self.std_errors[i],
                self.z_scores[i],
                self.p_values[i]
            )?;
        }
        if let Some(c) = self.concordance {
            writeln!(f, "concordance = {:.3}", c)?;
        }
        write!(
            f,
            "likelihood ratio test = {:.3} on {} df, p = {:.3e}",
            self.lr_statistic, self.lr_df, self.lr_p_value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn create_test_data() -> SurvivalData {
        SurvivalData::with_indicator(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
            vec![true, true, true, false, true, true, false, true, false, false],
            &[true, true, false, true, true, false, false, true, false, false],
        ).unwrap()
    }

    #[test]
    fn test_model_creation() {
        let model = CoxModel::new()
            .with_ties(TieMethod::Breslow)
            .with_max_iterations(50)
            .with_tolerance(1e-6);

        assert_eq!(model.ties, TieMethod::Breslow);
        assert_eq!(model.max_iterations, 50);
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_model_not_fitted_error() {
        let model = CoxModel::new();
        assert!(model.coefficients().is_err());
        assert!(model.summary().is_err());

        let covariates = Array2::zeros((5, 1));
        assert!(model.predict(covariates.view()).is_err());
    }

    #[test]
    fn test_fit_summary_is_consistent() {
        let data = create_test_data();
        let mut model = CoxModel::new().with_feature_names(vec!["Mutant".to_string()]);
        model.fit(&data).unwrap();

        let summary = model.summary().unwrap();
        let beta = summary.coefficients[0];
        assert!(beta > 0.0);
        assert_relative_eq!(summary.hazard_ratios[0], beta.exp(), epsilon = 1e-12);
        assert!(summary.lower_95[0] < summary.hazard_ratios[0]);
        assert!(summary.upper_95[0] > summary.hazard_ratios[0]);
        assert!(summary.p_values[0] > 0.0 && summary.p_values[0] < 1.0);
        assert!(summary.lr_statistic >= 0.0);
        assert_eq!(summary.n_events, 6);
        assert!(summary.to_string().contains("Mutant"));
    }

    #[test]
    fn test_tied_efron_summary_matches_reference() {
        // tied deaths at t=1 and t=3; values from solving the efron score equation directly
        let data = SurvivalData::with_indicator(
            vec![1.0, 1.0, 2.0, 3.0, 3.0, 4.0, 5.0, 6.0],
            vec![true, true, true, true, true, false, true, false],
            &[true, true, false, true, false, false, true, false],
        ).unwrap();
        let mut model = CoxModel::new();
        model.fit(&data).unwrap();
        let summary = model.summary().unwrap();

        assert_relative_eq!(summary.coefficients[0], 1.020121847556077, epsilon = 1e-6);
        assert_relative_eq!(summary.std_errors[0], 0.872204871661477, epsilon = 1e-6);
        assert_relative_eq!(summary.hazard_ratios[0], 2.7735326915562197, epsilon = 1e-5);
        assert_relative_eq!(summary.lower_95[0], 0.5018930207678842, epsilon = 1e-5);
        assert_relative_eq!(summary.upper_95[0], 15.32693875551761, epsilon = 1e-4);
        assert_relative_eq!(summary.p_values[0], 0.24216611813671263, epsilon = 1e-5);
        assert_relative_eq!(summary.lr_statistic, 1.4698034266661395, epsilon = 1e-6);
    }

    #[test]
    fn test_constant_covariate_rejected() {
        let data = SurvivalData::with_indicator(
            vec![1.0, 2.0, 3.0],
            vec![true, false, true],
            &[false, false, false],
        ).unwrap();

        let mut model = CoxModel::new();
        assert!(matches!(model.fit(&data), Err(SurvivalError::InvalidSurvivalData { .. })));
    }

    #[test]
    fn test_prediction_dimension_mismatch() {
        let data = create_test_data();
        let mut model = CoxModel::new();
        model.fit(&data).unwrap();

        let wrong_covariates = Array2::zeros((5, 2)); // should be 1 covariate
        assert!(model.predict(wrong_covariates.view()).is_err());

        let hr = model.predict_hazard_ratios(data.covariates()).unwrap();
        assert!(hr.iter().all(|&h| h > 0.0 && h.is_finite()));
    }
}
