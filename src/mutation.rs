//! Mutation data access.
//!
//! [`MutationStore`] is the read-only view the analysis needs from a cohort's
//! mutation calls. [`MafStore`] implements it over MAF-style records.

use std::collections::{HashMap, HashSet};
use std::io;

use ndarray::Array2;

use crate::clinical::SAMPLE_COLUMN;
use crate::error::{SurvivalError, Result};

pub const GENE_COLUMN: &str = "Hugo_Symbol";
pub const CLASSIFICATION_COLUMN: &str = "Variant_Classification";

/// variant classes counted as protein-altering by default
pub const NON_SYNONYMOUS_CLASSES: [&str; 9] = [
    "Frame_Shift_Del",
    "Frame_Shift_Ins",
    "Splice_Site",
    "Translation_Start_Site",
    "Nonsense_Mutation",
    "Nonstop_Mutation",
    "In_Frame_Del",
    "In_Frame_Ins",
    "Missense_Mutation",
];

/// per-gene mutation frequency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneSummary {
    pub gene: String,
    pub mutated_samples: usize,
    pub total_mutations: usize,
}

/// raw (unclamped) per-sample per-gene mutation counts
#[derive(Debug, Clone, PartialEq)]
pub struct MutationCounts {
    pub samples: Vec<String>,
    pub genes: Vec<String>,
    pub counts: Array2<u32>, // samples x genes
}

/// read-only access to a cohort's mutation calls
pub trait MutationStore {
    /// genes ranked by number of mutated samples, descending
    fn gene_summary(&self) -> &[GeneSummary];

    /// every sample in the cohort, mutated or not
    fn sample_ids(&self) -> &[String];

    /// counts for the requested genes; genes the store doesn't know are left
    /// out, samples without a mutation in any requested gene may be left out
    fn mutation_counts(&self, genes: &[String]) -> MutationCounts;
}

/// one line of a MAF file, reduced to what the analysis reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub sample: String,
    pub gene: String,
    pub variant_classification: String,
}

impl MutationRecord {
    pub fn new(
        sample: impl Into<String>,
        gene: impl Into<String>,
        variant_classification: impl Into<String>,
    ) -> Self {
        Self {
            sample: sample.into(),
            gene: gene.into(),
            variant_classification: variant_classification.into(),
        }
    }
}

/// which records count as mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantFilter {
    #[default]
    NonSynonymous,
    All,
}

impl VariantFilter {
    fn keeps(self, record: &MutationRecord) -> bool {
        match self {
            VariantFilter::All => true,
            VariantFilter::NonSynonymous => {
                NON_SYNONYMOUS_CLASSES.contains(&record.variant_classification.as_str())
            }
        }
    }
}

/// in-memory mutation store built from MAF records
#[derive(Debug, Clone, Default)]
pub struct MafStore {
    records: Vec<MutationRecord>,
    samples: Vec<String>,
    summary: Vec<GeneSummary>,
}

impl MafStore {
    pub fn from_records(records: impl IntoIterator<Item = MutationRecord>, filter: VariantFilter) -> Self {
        let mut samples = Vec::new();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for record in records {
            if seen.insert(record.sample.clone()) {
                samples.push(record.sample.clone());
            }
            if filter.keeps(&record) {
                kept.push(record);
            }
        }

        let summary = summarize(&kept);
        Self { records: kept, samples, summary }
    }

    /// add cohort samples that carry no mutation calls at all
    pub fn with_samples<S: Into<String>>(mut self, samples: impl IntoIterator<Item = S>) -> Self {
        let mut seen: HashSet<String> = self.samples.iter().cloned().collect();
        for sample in samples {
            let sample = sample.into();
            if seen.insert(sample.clone()) {
                self.samples.push(sample);
            }
        }
        self
    }

    /// read a delimited MAF; `#` lines are skipped
    pub fn from_reader<R: io::Read>(reader: R, delimiter: u8, filter: VariantFilter) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SurvivalError::missing_column(name, &headers))
        };
        let sample_idx = find(SAMPLE_COLUMN)?;
        let gene_idx = find(GENE_COLUMN)?;
        let class_idx = find(CLASSIFICATION_COLUMN)?;

        let mut records = Vec::new();
        for (line, row) in csv_reader.records().enumerate() {
            let row = row?;
            let field = |idx: usize| {
                row.get(idx).map(str::trim).ok_or_else(|| SurvivalError::Parse {
                    message: format!("record {} has only {} fields", line + 1, row.len()),
                })
            };
            records.push(MutationRecord::new(field(sample_idx)?, field(gene_idx)?, field(class_idx)?));
        }

        Ok(Self::from_records(records, filter))
    }

    pub fn n_mutations(&self) -> usize {
        self.records.len()
    }
}

/// rank genes by distinct mutated samples; ties keep first-seen order
fn summarize(records: &[MutationRecord]) -> Vec<GeneSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut per_gene: HashMap<&str, (HashSet<&str>, usize)> = HashMap::new();

    for record in records {
        let entry = per_gene.entry(record.gene.as_str()).or_insert_with(|| {
            order.push(record.gene.as_str());
            (HashSet::new(), 0)
        });
        entry.0.insert(record.sample.as_str());
        entry.1 += 1;
    }

    let mut summary: Vec<GeneSummary> = order
        .into_iter()
        .map(|gene| {
            let (samples, total) = &per_gene[gene];
            GeneSummary {
                gene: gene.to_string(),
                mutated_samples: samples.len(),
                total_mutations: *total,
            }
        })
        .collect();

    summary.sort_by(|a, b| b.mutated_samples.cmp(&a.mutated_samples));
    summary
}

impl MutationStore for MafStore {
    fn gene_summary(&self) -> &[GeneSummary] {
        &self.summary
    }

    fn sample_ids(&self) -> &[String] {
        &self.samples
    }

    fn mutation_counts(&self, genes: &[String]) -> MutationCounts {
        let known: HashSet<&str> = self.summary.iter().map(|s| s.gene.as_str()).collect();
        let mut requested = HashSet::new();
        let columns: Vec<String> = genes
            .iter()
            .filter(|g| known.contains(g.as_str()) && requested.insert(g.as_str()))
            .cloned()
            .collect();
        let column_of: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(j, g)| (g.as_str(), j))
            .collect();

        let mut samples: Vec<String> = Vec::new();
        let mut row_of: HashMap<&str, usize> = HashMap::new();
        let mut cells: Vec<(usize, usize)> = Vec::new();
        for record in &self.records {
            if let Some(&j) = column_of.get(record.gene.as_str()) {
                let i = *row_of.entry(record.sample.as_str()).or_insert_with(|| {
                    samples.push(record.sample.clone());
                    samples.len() - 1
                });
                cells.push((i, j));
            }
        }

        let mut counts = Array2::<u32>::zeros((samples.len(), columns.len()));
        for (i, j) in cells {
            counts[[i, j]] += 1;
        }

        MutationCounts { samples, genes: columns, counts }
    }
}
