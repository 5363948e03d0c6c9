use std::io;

use rayon::prelude::*;
use tracing::info;

use crate::{
    clinical::{harmonize, ClinicalTable, EventCoding, DEFAULT_STATUS_COLUMN, DEFAULT_TIME_COLUMN},
    error::{SurvivalError, Result},
    genes::{combinations, select_genes},
    group::{Evaluator, Outcome, SurvivalResult},
    matrix::build_mutation_matrix,
    mutation::MutationStore,
    optimization::TieMethod,
};

/// header of the result table
pub const RESULT_COLUMNS: [&str; 5] = ["Gene_combination", "P_value", "hr", "WT", "Mutant"];

/// survival analysis over gene-set mutation status
#[derive(Debug, Clone)]
pub struct SurvGroup {
    top_n: usize,                // genes taken from the frequency summary
    genes: Option<Vec<String>>,  // explicit universe, overrides top_n
    gene_set_size: usize,        // genes per combination
    min_samples: usize,          // mutant samples needed to test a combination
    time_column: String,
    status_column: String,
    ties: TieMethod,
    parallel: bool,
}

impl Default for SurvGroup {
    fn default() -> Self {
        Self {
            top_n: 20,
            genes: None,
            gene_set_size: 2,
            min_samples: 5,
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            status_column: DEFAULT_STATUS_COLUMN.to_string(),
            ties: TieMethod::default(),
            parallel: false,
        }
    }
}

impl SurvGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// use the N most frequently mutated genes
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// analyse exactly these genes, in this order
    pub fn with_genes<S: Into<String>>(mut self, genes: impl IntoIterator<Item = S>) -> Self {
        self.genes = Some(genes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_gene_set_size(mut self, size: usize) -> Self {
        self.gene_set_size = size;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self
    }

    pub fn with_status_column(mut self, column: impl Into<String>) -> Self {
        self.status_column = column.into();
        self
    }

    pub fn with_ties(mut self, ties: TieMethod) -> Self {
        self.ties = ties;
        self
    }

    /// evaluate combinations on the rayon pool; row order is unchanged
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.gene_set_size == 0 {
            return Err(SurvivalError::invalid_parameter("gene_set_size", "0"));
        }
        if self.min_samples == 0 {
            return Err(SurvivalError::invalid_parameter("min_samples", "0"));
        }
        Ok(())
    }

    /// run the whole pipeline
    pub fn run<S: MutationStore + ?Sized>(&self, store: &S, clinical: &ClinicalTable) -> Result<SurvGroupReport> {
        self.validate()?;

        let genes = select_genes(store, self.top_n, self.genes.as_deref())?;
        let combos = combinations(&genes, self.gene_set_size)?;
        info!(
            "{} genes, {} combinations of size {}",
            genes.len(),
            combos.len(),
            self.gene_set_size
        );

        let harmonized = harmonize(clinical, &self.time_column, &self.status_column)?;
        let coding = EventCoding::detect(&harmonized.records)?;
        let build = build_mutation_matrix(store, &genes)?;

        let evaluator = Evaluator::new(&build.matrix, &harmonized.records, coding, self.min_samples)
            .with_ties(self.ties);
        let outcomes: Vec<Outcome> = if self.parallel {
            combos.par_iter().map(|c| evaluator.evaluate(c)).collect()
        } else {
            combos.iter().map(|c| evaluator.evaluate(c)).collect()
        };

        let mut rows = Vec::new();
        let mut below_min_samples = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Evaluated(row) => rows.push(row),
                Outcome::TooFewMutants { combination, .. } => below_min_samples.push(combination),
                Outcome::Failed(err) => failures.push(err),
            }
        }

        info!(
            "{} combinations tested, {} below {} mutant samples, {} failed to fit",
            rows.len(),
            below_min_samples.len(),
            self.min_samples,
            failures.len()
        );

        Ok(SurvGroupReport {
            results: ResultTable::new(rows),
            genes,
            n_combinations: combos.len(),
            n_clinical_dropped: harmonized.n_dropped,
            samples_without_mutations: build.samples_without_mutations,
            below_min_samples,
            failures,
        })
    }
}

/// sort rows by ascending p-value; ties keep their incoming order
pub fn aggregate(mut results: Vec<SurvivalResult>) -> Vec<SurvivalResult> {
    results.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
    results
}

/// ranked result rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<SurvivalResult>,
}

impl ResultTable {
    pub fn new(rows: Vec<SurvivalResult>) -> Self {
        Self { rows: aggregate(rows) }
    }

    pub fn rows(&self) -> &[SurvivalResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, gene_combination: &str) -> Option<&SurvivalResult> {
        self.rows.iter().find(|r| r.gene_combination == gene_combination)
    }

    /// tab separated, header `Gene_combination P_value hr WT Mutant`
    pub fn write_tsv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        csv_writer.write_record(RESULT_COLUMNS)?;
        for row in &self.rows {
            csv_writer.write_record([
                row.gene_combination.clone(),
                row.p_value.to_string(),
                row.hazard_ratio.to_string(),
                row.n_wildtype.to_string(),
                row.n_mutant.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_tsv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_tsv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| SurvivalError::Parse { message: e.to_string() })
    }
}

/// everything a run produced, results plus diagnostics
#[derive(Debug, Clone)]
pub struct SurvGroupReport {
    pub results: ResultTable,
    pub genes: Vec<String>,
    pub n_combinations: usize,
    pub n_clinical_dropped: usize,
    pub samples_without_mutations: Vec<String>,
    pub below_min_samples: Vec<String>,
    pub failures: Vec<SurvivalError>,
}
