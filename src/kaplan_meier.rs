//! Product-limit survival curves with Greenwood errors and log-log intervals.

use crate::error::{SurvivalError, Result};

/// two-sided 95% normal quantile
const Z_95: f64 = 1.959_963_984_540_054;

/// one distinct observed time on a kaplan-meier curve
#[derive(Debug, Clone, PartialEq)]
pub struct KaplanMeierStep {
    pub time: f64,
    pub n_risk: usize,
    pub n_event: usize,
    pub n_censor: usize,
    pub survival: f64,
    /// greenwood standard error of the cumulative hazard
    pub std_err: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// kaplan-meier estimate for a single group
#[derive(Debug, Clone, PartialEq)]
pub struct KaplanMeier {
    n_samples: usize,
    n_events: usize,
    steps: Vec<KaplanMeierStep>,
}

impl KaplanMeier {
    pub fn fit(times: &[f64], events: &[bool]) -> Result<Self> {
        if times.len() != events.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                times.len(),
                events.len()
            )));
        }
        if times.is_empty() {
            return Err(SurvivalError::invalid_survival_data("empty group - nothing to estimate"));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data("survival times must be finite"));
        }

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut steps = Vec::new();
        let mut n_risk = times.len();
        let mut survival = 1.0;
        let mut greenwood = 0.0;
        let mut cursor = 0;

        while cursor < order.len() {
            let time = times[order[cursor]];
            let mut n_event = 0;
            let mut n_censor = 0;
            while cursor < order.len() && times[order[cursor]] == time {
                if events[order[cursor]] {
                    n_event += 1;
                } else {
                    n_censor += 1;
                }
                cursor += 1;
            }

            if n_event > 0 {
                let (n, d) = (n_risk as f64, n_event as f64);
                survival *= 1.0 - d / n;
                greenwood += if n_risk > n_event { d / (n * (n - d)) } else { f64::INFINITY };
            }

            let std_err = greenwood.sqrt();
            let (lower, upper) = log_log_interval(survival, std_err);
            steps.push(KaplanMeierStep {
                time,
                n_risk,
                n_event,
                n_censor,
                survival,
                std_err,
                lower,
                upper,
            });

            n_risk -= n_event + n_censor;
        }

        Ok(Self {
            n_samples: times.len(),
            n_events: events.iter().filter(|&&e| e).count(),
            steps,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_events(&self) -> usize {
        self.n_events
    }

    pub fn steps(&self) -> &[KaplanMeierStep] {
        &self.steps
    }

    /// S(t), right-continuous step function
    pub fn survival_at(&self, time: f64) -> f64 {
        self.steps
            .iter()
            .take_while(|step| step.time <= time)
            .last()
            .map_or(1.0, |step| step.survival)
    }

    /// first time the curve drops to 0.5 or below
    pub fn median(&self) -> Option<f64> {
        self.steps
            .iter()
            .find(|step| step.survival <= 0.5)
            .map(|step| step.time)
    }
}

fn log_log_interval(survival: f64, std_err: f64) -> (Option<f64>, Option<f64>) {
    if survival >= 1.0 {
        return (Some(1.0), Some(1.0));
    }
    if survival <= 0.0 || !std_err.is_finite() {
        return (None, None);
    }

    let log_s = survival.ln();
    let centre = (-log_s).ln();
    let a = (-(centre + Z_95 * std_err / log_s).exp()).exp();
    let b = (-(centre - Z_95 * std_err / log_s).exp()).exp();
    (Some(a.min(b)), Some(a.max(b)))
}
