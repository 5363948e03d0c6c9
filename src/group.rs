//! Mutant vs wild-type comparison for one gene combination.
//!
//! Group encoding is fixed: wild-type is the reference level (covariate 0)
//! and mutant is covariate 1, so the cox hazard ratio is always the hazard
//! of the mutant group relative to wild-type.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    clinical::{ClinicalRecord, EventCoding},
    data::SurvivalData,
    error::{SurvivalError, Result},
    genes::GeneCombination,
    kaplan_meier::KaplanMeier,
    logrank::LogRankTest,
    matrix::MutationMatrix,
    metrics::signif,
    model::{CoxModel, CoxModelSummary},
    optimization::TieMethod,
};

/// significant digits reported for p-values and hazard ratios
pub const REPORTED_DIGITS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    WildType,
    Mutant,
}

impl Group {
    /// reference level of the cox covariate
    pub const REFERENCE: Group = Group::WildType;

    pub fn label(self) -> &'static str {
        match self {
            Group::WildType => "WT",
            Group::Mutant => "Mutant",
        }
    }

    /// log-rank group index and cox covariate value
    pub fn index(self) -> usize {
        match self {
            Group::WildType => 0,
            Group::Mutant => 1,
        }
    }
}

/// one row of the result table
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalResult {
    pub gene_combination: String,
    pub p_value: f64,
    pub hazard_ratio: f64,
    pub n_wildtype: usize,
    pub n_mutant: usize,
}

/// the full two-group fit behind a result row
#[derive(Debug, Clone)]
pub struct GroupComparison {
    pub n_wildtype: usize,
    pub n_mutant: usize,
    pub wildtype_curve: KaplanMeier,
    pub mutant_curve: KaplanMeier,
    pub log_rank: LogRankTest,
    pub cox: CoxModelSummary,
}

impl GroupComparison {
    /// fit km curves, log-rank and cox on records labelled by `is_mutant`
    pub fn compare(
        records: &[ClinicalRecord],
        coding: EventCoding,
        is_mutant: impl Fn(&ClinicalRecord) -> bool,
        ties: TieMethod,
    ) -> Result<Self> {
        let groups: Vec<Group> = records
            .iter()
            .map(|r| if is_mutant(r) { Group::Mutant } else { Group::WildType })
            .collect();
        let times: Vec<f64> = records.iter().map(|r| r.time).collect();
        let events: Vec<bool> = records.iter().map(|r| coding.is_event(r.status)).collect();

        let n_mutant = groups.iter().filter(|&&g| g == Group::Mutant).count();
        let n_wildtype = groups.len() - n_mutant;
        if n_mutant == 0 || n_wildtype == 0 {
            return Err(SurvivalError::invalid_survival_data(format!(
                "need both groups, got {} WT and {} Mutant",
                n_wildtype, n_mutant
            )));
        }

        let curve = |group: Group| {
            let (t, e): (Vec<f64>, Vec<bool>) = groups
                .iter()
                .zip(times.iter().zip(&events))
                .filter(|(g, _)| **g == group)
                .map(|(_, (&t, &e))| (t, e))
                .unzip();
            KaplanMeier::fit(&t, &e)
        };
        let wildtype_curve = curve(Group::WildType)?;
        let mutant_curve = curve(Group::Mutant)?;

        let flagged: Vec<bool> = groups.iter().map(|&g| g == Group::Mutant).collect();
        let data = SurvivalData::with_indicator(times, events, &flagged)?;

        let indices: Vec<usize> = groups.iter().map(|g| g.index()).collect();
        let log_rank = LogRankTest::compute(&data, &indices)?;

        let mut model = CoxModel::new()
            .with_ties(ties)
            .with_feature_names(vec![Group::Mutant.label().to_string()]);
        model.fit(&data)?;
        let cox = model.summary()?.clone();

        Ok(Self {
            n_wildtype,
            n_mutant,
            wildtype_curve,
            mutant_curve,
            log_rank,
            cox,
        })
    }

    /// hazard of Mutant relative to WT
    pub fn hazard_ratio(&self) -> f64 {
        self.cox.hazard_ratios[0]
    }

    pub fn p_value(&self) -> f64 {
        self.log_rank.p_value
    }

    pub fn to_result(&self, combination: &GeneCombination) -> SurvivalResult {
        SurvivalResult {
            gene_combination: combination.key(),
            p_value: signif(self.p_value(), REPORTED_DIGITS),
            hazard_ratio: signif(self.hazard_ratio(), REPORTED_DIGITS),
            n_wildtype: self.n_wildtype,
            n_mutant: self.n_mutant,
        }
    }
}

/// what happened to one combination
#[derive(Debug, Clone)]
pub enum Outcome {
    Evaluated(SurvivalResult),
    TooFewMutants { combination: String, n_mutant: usize },
    Failed(SurvivalError),
}

/// shared, read-only inputs for evaluating combinations
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    matrix: &'a MutationMatrix,
    records: &'a [ClinicalRecord],
    coding: EventCoding,
    min_samples: usize,
    ties: TieMethod,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        matrix: &'a MutationMatrix,
        records: &'a [ClinicalRecord],
        coding: EventCoding,
        min_samples: usize,
    ) -> Self {
        Self {
            matrix,
            records,
            coding,
            min_samples,
            ties: TieMethod::default(),
        }
    }

    pub fn with_ties(mut self, ties: TieMethod) -> Self {
        self.ties = ties;
        self
    }

    /// mutant samples of the combination, or their count if below the minimum
    fn mutants(&self, combination: &GeneCombination) -> std::result::Result<HashSet<&'a str>, usize> {
        let mutants: HashSet<&str> = self.matrix.mutant_samples(combination).into_iter().collect();
        if mutants.len() < self.min_samples {
            Err(mutants.len())
        } else {
            Ok(mutants)
        }
    }

    /// mutants without clinical follow-up don't count towards the minimum
    fn clinical_mutants(&self, mutants: &HashSet<&str>) -> usize {
        self.records
            .iter()
            .filter(|r| mutants.contains(r.sample_id.as_str()))
            .count()
    }

    fn compare_with(&self, combination: &GeneCombination, mutants: &HashSet<&str>) -> Result<GroupComparison> {
        GroupComparison::compare(
            self.records,
            self.coding,
            |r| mutants.contains(r.sample_id.as_str()),
            self.ties,
        )
        .map_err(|e| SurvivalError::fit_failed(combination.key(), e.to_string()))
    }

    /// the full comparison, for callers that want curves and model details
    pub fn compare(&self, combination: &GeneCombination) -> Result<Option<GroupComparison>> {
        let Ok(mutants) = self.mutants(combination) else {
            return Ok(None);
        };
        if self.clinical_mutants(&mutants) < self.min_samples {
            return Ok(None);
        }

        self.compare_with(combination, &mutants).map(Some)
    }

    pub fn evaluate(&self, combination: &GeneCombination) -> Outcome {
        let key = combination.key();
        let mutants = match self.mutants(combination) {
            Ok(mutants) => mutants,
            Err(n_mutant) => {
                debug!("{}: {} mutant samples, below minimum {}", key, n_mutant, self.min_samples);
                return Outcome::TooFewMutants { combination: key, n_mutant };
            }
        };

        let n_clinical = self.clinical_mutants(&mutants);
        if n_clinical < self.min_samples {
            debug!(
                "{}: {} mutant samples with clinical data, below minimum {}",
                key, n_clinical, self.min_samples
            );
            return Outcome::TooFewMutants { combination: key, n_mutant: n_clinical };
        }

        match self.compare_with(combination, &mutants) {
            Ok(comparison) => {
                debug!(
                    "{}: {} Mutant vs {} WT samples",
                    key, comparison.n_mutant, comparison.n_wildtype
                );
                Outcome::Evaluated(comparison.to_result(combination))
            }
            Err(err) => {
                warn!("{}", err);
                Outcome::Failed(err)
            }
        }
    }
}

/// full comparison for one combination; Ok(None) when it is below `min_samples`
pub fn compare_groups(
    combination: &GeneCombination,
    matrix: &MutationMatrix,
    records: &[ClinicalRecord],
    coding: EventCoding,
    min_samples: usize,
) -> Result<Option<GroupComparison>> {
    Evaluator::new(matrix, records, coding, min_samples).compare(combination)
}

/// evaluate one combination; None when it is filtered out or can't be fit
pub fn evaluate(
    combination: &GeneCombination,
    matrix: &MutationMatrix,
    records: &[ClinicalRecord],
    min_samples: usize,
) -> Option<SurvivalResult> {
    let coding = match EventCoding::detect(records) {
        Ok(coding) => coding,
        Err(err) => {
            warn!("{}", err);
            return None;
        }
    };

    match Evaluator::new(matrix, records, coding, min_samples).evaluate(combination) {
        Outcome::Evaluated(result) => Some(result),
        Outcome::TooFewMutants { .. } | Outcome::Failed(_) => None,
    }
}
