use std::fmt;

use tracing::info;

use crate::{
    error::{SurvivalError, Result},
    mutation::MutationStore,
};

/// pick the gene universe: an explicit list as given, else the `top_n` most mutated genes
pub fn select_genes<S: MutationStore + ?Sized>(
    store: &S,
    top_n: usize,
    explicit: Option<&[String]>,
) -> Result<Vec<String>> {
    let genes: Vec<String> = match explicit {
        Some(genes) => genes.to_vec(),
        None => store
            .gene_summary()
            .iter()
            .take(top_n)
            .map(|summary| summary.gene.clone())
            .collect(),
    };

    if genes.len() < 2 {
        return Err(SurvivalError::insufficient_genes(genes.len(), "gene selection"));
    }

    info!("selected {} genes", genes.len());
    Ok(genes)
}

/// a fixed-size set of genes evaluated jointly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneCombination {
    genes: Vec<String>,
}

impl GeneCombination {
    pub fn new(genes: Vec<String>) -> Self {
        Self { genes }
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// result row key, e.g. `TP53_KRAS`
    pub fn key(&self) -> String {
        self.genes.join("_")
    }
}

impl fmt::Display for GeneCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// number of size-k subsets of n items, saturating at `u128::MAX`
pub fn n_combinations(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by i + 1; divide before multiplying
        let (numerator, denominator) = ((n - i) as u128, (i + 1) as u128);
        let g = gcd(acc, denominator);
        let (acc_part, denominator) = (acc / g, denominator / g);
        match acc_part.checked_mul(numerator / denominator) {
            Some(next) => acc = next,
            None => return u128::MAX,
        }
    }
    acc
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// all size-k subsets of `genes`, lexicographic in input order
pub fn combinations(genes: &[String], k: usize) -> Result<Vec<GeneCombination>> {
    let n = genes.len();
    if k == 0 || k > n {
        return Err(SurvivalError::invalid_parameter(
            "gene_set_size",
            format!("{} (gene universe has {} genes)", k, n),
        ));
    }

    let mut out = Vec::with_capacity(n_combinations(n, k).min(1 << 20) as usize);
    let mut indices: Vec<usize> = (0..k).collect();

    loop {
        out.push(GeneCombination::new(indices.iter().map(|&i| genes[i].clone()).collect()));

        // rightmost index that can still move
        let Some(pivot) = (0..k).rev().find(|&i| indices[i] != i + n - k) else {
            break;
        };
        indices[pivot] += 1;
        for j in pivot + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MafStore, MutationRecord, VariantFilter};
    use std::collections::HashSet;

    fn names(genes: &[&str]) -> Vec<String> {
        genes.iter().map(|g| g.to_string()).collect()
    }

    fn store() -> MafStore {
        let records = [
            ("S1", "KRAS"), ("S2", "TP53"), ("S3", "TP53"), ("S4", "TP53"),
            ("S1", "PIK3CA"), ("S2", "PIK3CA"), ("S5", "APC"),
        ];
        MafStore::from_records(
            records.iter().map(|(s, g)| MutationRecord::new(*s, *g, "Missense_Mutation")),
            VariantFilter::NonSynonymous,
        )
    }

    #[test]
    fn test_select_top_genes() {
        let genes = select_genes(&store(), 3, None).unwrap();
        // KRAS and APC tie on one sample; KRAS was seen first
        assert_eq!(genes, names(&["TP53", "PIK3CA", "KRAS"]));
    }

    #[test]
    fn test_explicit_genes_used_as_is() {
        let explicit = names(&["APC", "MYC", "TP53"]);
        let genes = select_genes(&store(), 1, Some(&explicit)).unwrap();
        assert_eq!(genes, explicit);
    }

    #[test]
    fn test_insufficient_genes() {
        assert!(matches!(
            select_genes(&store(), 1, None),
            Err(SurvivalError::InsufficientGenes { found: 1, .. })
        ));
        let one = names(&["TP53"]);
        assert!(select_genes(&store(), 20, Some(&one)).is_err());
    }

    #[test]
    fn test_combinations_lexicographic() {
        let genes = names(&["A", "B", "C", "D"]);
        let keys: Vec<String> = combinations(&genes, 2).unwrap().iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["A_B", "A_C", "A_D", "B_C", "B_D", "C_D"]);
    }

    #[test]
    fn test_combination_counts_are_exact() {
        let genes: Vec<String> = (0..9).map(|i| format!("G{}", i)).collect();
        for k in 1..=genes.len() {
            let combos = combinations(&genes, k).unwrap();
            assert_eq!(combos.len() as u128, n_combinations(genes.len(), k));

            let distinct: HashSet<&GeneCombination> = combos.iter().collect();
            assert_eq!(distinct.len(), combos.len());
            assert!(combos.iter().all(|c| c.len() == k));
        }
    }

    #[test]
    fn test_full_size_gives_one_combination() {
        let genes = names(&["A", "B", "C"]);
        let combos = combinations(&genes, 3).unwrap();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].to_string(), "A_B_C");
    }

    #[test]
    fn test_bad_set_size() {
        let genes = names(&["A", "B"]);
        assert!(combinations(&genes, 0).is_err());
        assert!(combinations(&genes, 3).is_err());
        assert_eq!(n_combinations(20, 2), 190);
        assert_eq!(n_combinations(2, 3), 0);
    }

    #[test]
    fn test_large_counts_do_not_overflow() {
        assert_eq!(n_combinations(130, 65), 95067625827960698145584333020095113100);
        assert_eq!(n_combinations(128, 64), 23951146041928082866135587776380551750);
        assert_eq!(n_combinations(200, 100), u128::MAX);
        assert_eq!(n_combinations(1000, 2), 499500);
    }
}
