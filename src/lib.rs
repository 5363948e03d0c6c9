//! # mutation survival
//!
//! survival analysis over gene mutation combinations - which gene sets split a cohort
//! into groups that live measurably longer or shorter?
//!
//! ## what you get
//!
//! - top-N or hand-picked gene universe, every size-k combination of it
//! - mutant (mutated in all genes of the set) vs wild-type grouping per combination
//! - kaplan-meier curves, log-rank p-value and cox hazard ratio per combination
//! - one table ranked by p-value, plus run diagnostics
//! - parallel evaluation when you want it
//!
//! ## quick start
//!
//! ```rust
//! use mutation_survival::{ClinicalTable, MafStore, MutationRecord, SurvGroup, VariantFilter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let maf = MafStore::from_records(
//!     vec![
//!         MutationRecord::new("S1", "TP53", "Missense_Mutation"),
//!         MutationRecord::new("S2", "TP53", "Nonsense_Mutation"),
//!         MutationRecord::new("S3", "KRAS", "Missense_Mutation"),
//!     ],
//!     VariantFilter::NonSynonymous,
//! );
//!
//! let clinical = ClinicalTable::new(["Tumor_Sample_Barcode", "Time", "Status"])
//!     .with_row(vec!["S1".into(), 10.0.into(), 1.into()])?
//!     .with_row(vec!["S2".into(), 14.0.into(), 1.into()])?
//!     .with_row(vec!["S3".into(), 30.0.into(), 0.into()])?
//!     .with_row(vec!["S4".into(), 42.0.into(), 1.into()])?;
//!
//! let report = SurvGroup::new()
//!     .with_gene_set_size(1)
//!     .with_min_samples(2)
//!     .run(&maf, &clinical)?;
//!
//! for row in report.results.rows() {
//!     println!("{}\t{}\t{}", row.gene_combination, row.p_value, row.hazard_ratio);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod clinical;
pub mod data;
pub mod error;
pub mod genes;
pub mod group;
pub mod kaplan_meier;
pub mod logrank;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod mutation;
pub mod optimization;

pub use analysis::{aggregate, ResultTable, SurvGroup, SurvGroupReport};
pub use clinical::{harmonize, ClinicalRecord, ClinicalTable, EventCoding, Harmonized, Value};
pub use data::SurvivalData;
pub use error::{SurvivalError, Result};
pub use genes::{combinations, select_genes, GeneCombination};
pub use group::{compare_groups, evaluate, Evaluator, Group, GroupComparison, Outcome, SurvivalResult};
pub use kaplan_meier::KaplanMeier;
pub use logrank::LogRankTest;
pub use matrix::{build_mutation_matrix, MatrixBuild, MutationMatrix};
pub use model::CoxModel;
pub use mutation::{GeneSummary, MafStore, MutationRecord, MutationStore, VariantFilter};
pub use optimization::TieMethod;
