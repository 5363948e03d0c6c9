use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use crate::error::{SurvivalError, Result};

/// one distinct event time: who died there and who was still at risk
#[derive(Debug, Clone, PartialEq)]
pub struct EventStratum {
    pub time: f64,
    pub deaths: Vec<usize>,  // samples with an event at exactly `time`
    pub at_risk: Vec<usize>, // samples with time >= `time`
}

impl EventStratum {
    pub fn n_deaths(&self) -> usize {
        self.deaths.len()
    }

    pub fn n_at_risk(&self) -> usize {
        self.at_risk.len()
    }
}

/// survival data - times, events, and covariates for the cox / log-rank fits
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,        // time to event/censoring
    events: Array1<bool>,      // true = event, false = censored
    covariates: Array2<f64>,   // n_samples x n_features
    strata: Vec<EventStratum>, // precomputed, ordered by time
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    pub fn new(times: Vec<f64>, events: Vec<bool>, covariates: Array2<f64>) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if times.iter().any(|t| !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be finite",
            ));
        }

        let mut data = Self {
            times: Array1::from(times),
            events: Array1::from(events),
            covariates,
            strata: Vec::new(),
        };

        data.compute_strata();
        Ok(data)
    }

    /// single binary covariate: 1.0 for members of the flagged group, 0.0 otherwise
    pub fn with_indicator(times: Vec<f64>, events: Vec<bool>, flagged: &[bool]) -> Result<Self> {
        let indicator: Vec<f64> = flagged.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
        let n = indicator.len();
        let covariates = Array2::from_shape_vec((n, 1), indicator)
            .map_err(|e| SurvivalError::invalid_dimensions(e.to_string()))?;

        Self::new(times, events, covariates)
    }

    /// precompute deaths and risk sets for each distinct event time
    fn compute_strata(&mut self) {
        let event_times = self.event_times();

        self.strata = event_times
            .into_iter()
            .map(|time| {
                let deaths = (0..self.n_samples())
                    .filter(|&i| self.events[i] && self.times[i] == time)
                    .collect();
                // everyone who hasn't died/been censored before this time
                let at_risk = (0..self.n_samples())
                    .filter(|&i| self.times[i] >= time)
                    .collect();
                EventStratum { time, deaths, at_risk }
            })
            .collect();
    }

    /// how many samples
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many covariates per sample
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// how many observed events
    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    /// survival/censoring times
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> ArrayView1<'_, bool> {
        self.events.view()
    }

    /// sample covariate matrix
    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// deaths + risk sets per distinct event time, ascending
    pub fn strata(&self) -> &[EventStratum] {
        &self.strata
    }

    /// unique event times in order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }

    /// does a covariate take a single value across all samples?
    pub fn is_constant(&self, feature: usize) -> bool {
        let column = self.covariates.column(feature);
        match column.iter().next() {
            Some(&first) => column.iter().all(|&x| x == first),
            None => true,
        }
    }
}
