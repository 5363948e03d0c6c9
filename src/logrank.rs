use ndarray::{s, Array1, Array2};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
    optimization::solve_linear_system,
};

/// k-sample log-rank test (mantel-haenszel weights)
#[derive(Debug, Clone, PartialEq)]
pub struct LogRankTest {
    pub n: Vec<usize>,
    pub observed: Array1<f64>,
    pub expected: Array1<f64>,
    pub variance: Array2<f64>,
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
}

impl LogRankTest {
    /// `groups[i]` is the group index (0..k) of sample i
    pub fn compute(data: &SurvivalData, groups: &[usize]) -> Result<Self> {
        if groups.len() != data.n_samples() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "groups len ({}) != n_samples ({})",
                groups.len(),
                data.n_samples()
            )));
        }

        let k = groups.iter().max().map_or(0, |&g| g + 1);
        let mut n = vec![0usize; k];
        for &g in groups {
            n[g] += 1;
        }
        if k < 2 || n.iter().any(|&count| count == 0) {
            return Err(SurvivalError::invalid_survival_data(format!(
                "log-rank needs at least 2 non-empty groups, got sizes {:?}",
                n
            )));
        }

        let mut observed = Array1::zeros(k);
        let mut expected = Array1::zeros(k);
        let mut variance = Array2::zeros((k, k));

        for stratum in data.strata() {
            let total = stratum.n_at_risk() as f64;
            let deaths = stratum.n_deaths() as f64;

            let mut at_risk = vec![0.0; k];
            for &i in &stratum.at_risk {
                at_risk[groups[i]] += 1.0;
            }
            for &i in &stratum.deaths {
                observed[groups[i]] += 1.0;
            }

            for g in 0..k {
                expected[g] += deaths * at_risk[g] / total;
            }

            if total > 1.0 {
                let scale = deaths * (total - deaths) / (total - 1.0);
                for g in 0..k {
                    let share = at_risk[g] / total;
                    for h in 0..k {
                        let kronecker = if g == h { 1.0 } else { 0.0 };
                        variance[[g, h]] += scale * share * (kronecker - at_risk[h] / total);
                    }
                }
            }
        }

        // last group is redundant: O - E sums to zero
        let df = k - 1;
        let diff = (&observed - &expected).slice(s![..df]).to_owned();
        let reduced = variance.slice(s![..df, ..df]).to_owned();
        let solved = solve_linear_system(&reduced, &diff)?;
        let statistic = diff.dot(&solved);

        if !statistic.is_finite() {
            return Err(SurvivalError::numerical_error("log-rank statistic is not finite"));
        }

        let p_value = ChiSquared::new(df as f64)
            .map(|chi| 1.0 - chi.cdf(statistic))
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;

        Ok(Self {
            n,
            observed,
            expected,
            variance,
            statistic,
            df,
            p_value,
        })
    }
}
