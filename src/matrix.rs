use std::collections::{HashMap, HashSet};

use ndarray::{Array2, Axis};
use tracing::{debug, info};

use crate::{
    error::{SurvivalError, Result},
    genes::GeneCombination,
    mutation::MutationStore,
};

/// binary samples x genes presence/absence matrix
#[derive(Debug, Clone, PartialEq)]
pub struct MutationMatrix {
    samples: Vec<String>,
    genes: Vec<String>,
    values: Array2<u8>,
    gene_index: HashMap<String, usize>,
}

impl MutationMatrix {
    /// clamp counts to 0/1
    pub fn from_counts(samples: Vec<String>, genes: Vec<String>, counts: &Array2<u32>) -> Result<Self> {
        if counts.nrows() != samples.len() || counts.ncols() != genes.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "count matrix is {:?}, expected {} samples x {} genes",
                counts.shape(),
                samples.len(),
                genes.len()
            )));
        }

        let gene_index = genes.iter().enumerate().map(|(j, g)| (g.clone(), j)).collect();
        Ok(Self {
            values: counts.mapv(|c| u8::from(c > 0)),
            samples,
            genes,
            gene_index,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn values(&self) -> &Array2<u8> {
        &self.values
    }

    pub fn is_mutated(&self, sample: usize, gene: &str) -> bool {
        self.gene_index
            .get(gene)
            .map_or(false, |&j| self.values[[sample, j]] == 1)
    }

    /// samples mutated in every gene of the combination (logical AND)
    pub fn mutant_samples(&self, combination: &GeneCombination) -> Vec<&str> {
        let columns: Option<Vec<usize>> = combination
            .genes()
            .iter()
            .map(|g| self.gene_index.get(g).copied())
            .collect();
        // a gene with no column can't be mutated in anyone
        let Some(columns) = columns else {
            return Vec::new();
        };

        let selected = self.values.select(Axis(1), &columns);
        selected
            .axis_iter(Axis(0))
            .zip(&self.samples)
            .filter(|(row, _)| row.iter().map(|&v| usize::from(v)).sum::<usize>() == combination.len())
            .map(|(_, sample)| sample.as_str())
            .collect()
    }
}

/// matrix plus the cohort samples it has no rows for
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuild {
    pub matrix: MutationMatrix,
    pub samples_without_mutations: Vec<String>,
}

/// binarized mutation matrix restricted to `genes`
pub fn build_mutation_matrix<S: MutationStore + ?Sized>(store: &S, genes: &[String]) -> Result<MatrixBuild> {
    let counts = store.mutation_counts(genes);

    if counts.genes.len() < 2 {
        return Err(SurvivalError::insufficient_genes(
            counts.genes.len(),
            "mutation matrix",
        ));
    }

    let unresolved: Vec<&String> = genes.iter().filter(|g| !counts.genes.contains(*g)).collect();
    if !unresolved.is_empty() {
        debug!("genes without mutation data: {:?}", unresolved);
    }

    let matrix = MutationMatrix::from_counts(counts.samples, counts.genes, &counts.counts)?;
    let present: HashSet<&str> = matrix.samples().iter().map(String::as_str).collect();
    let samples_without_mutations: Vec<String> = store
        .sample_ids()
        .iter()
        .filter(|s| !present.contains(s.as_str()))
        .cloned()
        .collect();

    info!(
        "mutation matrix: {} samples x {} genes, {} cohort samples without mutations in these genes",
        matrix.samples().len(),
        matrix.genes().len(),
        samples_without_mutations.len()
    );

    Ok(MatrixBuild { matrix, samples_without_mutations })
}
