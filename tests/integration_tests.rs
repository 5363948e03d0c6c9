use mutation_survival::{
    genes::n_combinations, ClinicalTable, MafStore, MutationRecord, SurvGroup, SurvivalError, Value,
    VariantFilter,
};
use approx::assert_relative_eq;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// 10 samples, 6 dead / 4 censored; A mutants die early
fn scenario_clinical() -> ClinicalTable {
    let rows: [(&str, f64, i32); 10] = [
        ("S1", 1.0, 1),
        ("S2", 2.0, 1),
        ("S3", 3.0, 1),
        ("S6", 3.5, 1),
        ("S4", 4.0, 1),
        ("S5", 6.0, 0),
        ("S7", 8.0, 1),
        ("S8", 9.0, 0),
        ("S9", 10.0, 0),
        ("S10", 12.0, 0),
    ];

    let mut table = ClinicalTable::new(["Tumor_Sample_Barcode", "Time", "Status"]);
    for (id, time, status) in rows {
        table.push_row(vec![id.into(), time.into(), status.into()]).unwrap();
    }
    table
}

fn scenario_store() -> MafStore {
    let calls = [
        ("S1", "A"), ("S2", "A"), ("S3", "A"), ("S4", "A"), ("S5", "A"),
        ("S2", "B"), ("S7", "B"), ("S9", "B"),
        ("S3", "C"), ("S8", "C"),
        ("S10", "D"),
    ];
    MafStore::from_records(
        calls.iter().map(|(s, g)| MutationRecord::new(*s, *g, "Missense_Mutation")),
        VariantFilter::NonSynonymous,
    )
    .with_samples(["S6"])
}

fn scenario() -> SurvGroup {
    SurvGroup::new()
        .with_genes(["A", "B", "C", "D"])
        .with_gene_set_size(1)
        .with_min_samples(2)
}

#[test]
fn test_end_to_end_single_genes() {
    let report = scenario().run(&scenario_store(), &scenario_clinical()).unwrap();
    let results = &report.results;

    assert_eq!(report.n_combinations, 4);
    assert_eq!(report.n_clinical_dropped, 0);

    // D has a single mutant and never makes it into the table
    assert!(results.get("D").is_none());
    assert_eq!(report.below_min_samples, vec!["D"]);
    assert_eq!(results.len(), 3);

    let a = results.get("A").unwrap();
    let b = results.get("B").unwrap();
    assert_eq!(results.rows()[0].gene_combination, "A");
    assert!(a.p_value < b.p_value);
    assert!(a.hazard_ratio > 1.0);
    assert_eq!((a.n_mutant, a.n_wildtype), (5, 5));
    assert_eq!((b.n_mutant, b.n_wildtype), (3, 7));
}

#[test]
fn test_log_rank_p_value_for_gene_a() {
    let report = scenario().run(&scenario_store(), &scenario_clinical()).unwrap();
    let a = report.results.get("A").unwrap();

    // O = 4 deaths among A mutants; E and V summed over the six death times
    let expected = 0.5 + 4.0 / 9.0 + 3.0 / 8.0 + 2.0 / 7.0 + 2.0 / 6.0;
    let variance = 0.25 + 20.0 / 81.0 + 15.0 / 64.0 + 10.0 / 49.0 + 8.0 / 36.0;
    let statistic: f64 = (4.0 - expected) * (4.0 - expected) / variance;
    let p_value = 1.0 - ChiSquared::new(1.0).unwrap().cdf(statistic);

    assert!(a.p_value > 0.01 && a.p_value < 0.1);
    assert_relative_eq!(a.p_value, p_value, max_relative = 5e-3);
    assert_relative_eq!(
        a.p_value,
        mutation_survival::metrics::signif(a.p_value, 3),
        epsilon = 1e-15
    );
}

#[test]
fn test_runs_are_byte_identical() {
    let first = scenario().run(&scenario_store(), &scenario_clinical()).unwrap();
    let second = scenario().run(&scenario_store(), &scenario_clinical()).unwrap();
    assert_eq!(
        first.results.to_tsv_string().unwrap(),
        second.results.to_tsv_string().unwrap()
    );

    let parallel = scenario()
        .with_parallel(true)
        .run(&scenario_store(), &scenario_clinical())
        .unwrap();
    assert_eq!(parallel.results, first.results);
}

#[test]
fn test_one_two_status_coding_matches_zero_one() {
    let zero_one = scenario_clinical();
    let mut one_two = ClinicalTable::new(["Tumor_Sample_Barcode", "Time", "Status"]);
    let baseline = scenario().run(&scenario_store(), &zero_one).unwrap();

    for (id, time, status) in [
        ("S1", 1.0, 2), ("S2", 2.0, 2), ("S3", 3.0, 2), ("S6", 3.5, 2), ("S4", 4.0, 2),
        ("S5", 6.0, 1), ("S7", 8.0, 2), ("S8", 9.0, 1), ("S9", 10.0, 1), ("S10", 12.0, 1),
    ] {
        one_two.push_row(vec![id.into(), time.into(), status.into()]).unwrap();
    }
    let recoded = scenario().run(&scenario_store(), &one_two).unwrap();

    assert_eq!(recoded.results, baseline.results);
}

#[test]
fn test_missing_columns_are_fatal() {
    let mut table = ClinicalTable::new(["Tumor_Sample_Barcode", "OS", "Status"]);
    table.push_row(vec!["S1".into(), 1.0.into(), 1.into()]).unwrap();

    match scenario().run(&scenario_store(), &table) {
        Err(SurvivalError::MissingColumn { column, available }) => {
            assert_eq!(column, "Time");
            assert_eq!(available, vec!["Tumor_Sample_Barcode", "OS", "Status"]);
        }
        other => panic!("expected MissingColumn, got {:?}", other.map(|r| r.results)),
    }

    // same table works once the time column is named
    let report = scenario()
        .with_time_column("OS")
        .run(&scenario_store(), &table);
    assert!(report.is_ok());
}

#[test]
fn test_unusable_clinical_rows_are_dropped() {
    let mut table = scenario_clinical();
    table.push_row(vec!["S11".into(), f64::INFINITY.into(), 1.into()]).unwrap();
    table.push_row(vec!["S12".into(), "unknown".into(), 0.into()]).unwrap();
    table.push_row(vec!["S13".into(), 5.0.into(), Value::Missing]).unwrap();

    let report = scenario().run(&scenario_store(), &table).unwrap();
    assert_eq!(report.n_clinical_dropped, 3);

    let clean = scenario().run(&scenario_store(), &scenario_clinical()).unwrap();
    assert_eq!(report.results, clean.results);
}

#[test]
fn test_gene_set_size_equal_to_universe() {
    let report = SurvGroup::new()
        .with_genes(["A", "B", "C"])
        .with_gene_set_size(3)
        .with_min_samples(1)
        .run(&scenario_store(), &scenario_clinical())
        .unwrap();

    assert_eq!(report.n_combinations, 1);
    // nobody carries A, B and C together
    assert!(report.results.is_empty());
    assert_eq!(report.below_min_samples, vec!["A_B_C"]);
}

#[test]
fn test_single_group_combination_is_omitted() {
    // every clinical sample carries E
    let mut calls: Vec<MutationRecord> = (1..=10)
        .map(|i| MutationRecord::new(format!("S{}", i), "E", "Missense_Mutation"))
        .collect();
    calls.push(MutationRecord::new("S1", "A", "Missense_Mutation"));
    calls.push(MutationRecord::new("S7", "A", "Missense_Mutation"));
    let store = MafStore::from_records(calls, VariantFilter::NonSynonymous);

    let report = SurvGroup::new()
        .with_genes(["E", "A"])
        .with_gene_set_size(1)
        .with_min_samples(2)
        .run(&store, &scenario_clinical())
        .unwrap();

    assert!(report.results.get("E").is_none());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0],
        SurvivalError::FitFailed { combination, .. } if combination == "E"
    ));
    assert!(report.results.get("A").is_some());
}

#[test]
fn test_insufficient_genes_are_fatal() {
    let store = MafStore::from_records(
        vec![MutationRecord::new("S1", "A", "Missense_Mutation")],
        VariantFilter::NonSynonymous,
    );
    let err = SurvGroup::new().run(&store, &scenario_clinical()).unwrap_err();
    assert!(matches!(err, SurvivalError::InsufficientGenes { found: 1, .. }));

    // explicit genes the store has never seen fail at matrix time
    let err = SurvGroup::new()
        .with_genes(["A", "NOT_A_GENE"])
        .run(&store, &scenario_clinical())
        .unwrap_err();
    assert!(matches!(err, SurvivalError::InsufficientGenes { found: 1, .. }));
}

fn synthetic_cohort(n_samples: usize, n_genes: usize, seed: u64) -> (MafStore, ClinicalTable) {
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut calls = Vec::new();
    let mut clinical = ClinicalTable::new(["Tumor_Sample_Barcode", "Time", "Status"]);

    for i in 0..n_samples {
        let sample = format!("TCGA-{:04}", i);
        let mut hazard = 0.1;
        for g in 0..n_genes {
            // gene 0 is common and harmful, the rest are noise
            let rate = if g == 0 { 0.4 } else { 0.15 + 0.05 * g as f64 };
            if rng.gen::<f64>() < rate {
                calls.push(MutationRecord::new(sample.clone(), format!("G{}", g), "Missense_Mutation"));
                if g == 0 {
                    hazard *= 3.0;
                }
            }
        }

        let time = -rng.gen::<f64>().ln() / hazard;
        let censoring = rng.gen_range(1.0..30.0);
        let (time, status) = if time < censoring { (time, 1) } else { (censoring, 0) };
        clinical
            .push_row(vec![sample.as_str().into(), time.into(), status.into()])
            .unwrap();
    }

    (MafStore::from_records(calls, VariantFilter::NonSynonymous), clinical)
}

#[test]
fn test_result_table_invariants() {
    let (store, clinical) = synthetic_cohort(80, 6, 42);
    let min_samples = 3;

    let report = SurvGroup::new()
        .with_top_n(6)
        .with_gene_set_size(2)
        .with_min_samples(min_samples)
        .run(&store, &clinical)
        .unwrap();

    let rows = report.results.rows();
    assert_eq!(report.n_combinations as u128, n_combinations(6, 2));
    assert!(rows.len() <= report.n_combinations);
    assert_eq!(
        rows.len() + report.below_min_samples.len() + report.failures.len(),
        report.n_combinations
    );

    for pair in rows.windows(2) {
        assert!(pair[0].p_value <= pair[1].p_value);
    }
    for row in rows {
        assert!(row.n_mutant >= min_samples);
        assert_eq!(row.n_mutant + row.n_wildtype, 80);
        assert!(row.p_value >= 0.0 && row.p_value <= 1.0);
        assert!(row.hazard_ratio > 0.0 && row.hazard_ratio.is_finite());
    }
}

#[test]
fn test_harmful_gene_is_detected() {
    let (store, clinical) = synthetic_cohort(150, 4, 7);

    let report = SurvGroup::new()
        .with_genes(["G0", "G1", "G2", "G3"])
        .with_gene_set_size(1)
        .with_min_samples(5)
        .run(&store, &clinical)
        .unwrap();

    let g0 = report.results.get("G0").unwrap();
    assert!(g0.hazard_ratio > 1.5, "hazard ratio was {}", g0.hazard_ratio);
    assert_eq!(report.results.rows()[0].gene_combination, "G0");
}

#[test]
fn test_ordinary_cohorts_never_drop_combinations() {
    for seed in 0..60 {
        let (store, clinical) = synthetic_cohort(100, 4, seed);

        let report = SurvGroup::new()
            .with_genes(["G0", "G1", "G2", "G3"])
            .with_gene_set_size(1)
            .with_min_samples(5)
            .run(&store, &clinical)
            .unwrap();

        assert!(report.failures.is_empty(), "seed {}: {:?}", seed, report.failures);
        assert_eq!(
            report.results.len() + report.below_min_samples.len(),
            report.n_combinations
        );
    }
}

#[test]
fn test_unknown_status_codes_abort_the_run() {
    let mut table = scenario_clinical();
    table.push_row(vec!["S11".into(), 5.0.into(), 3.into()]).unwrap();

    let err = scenario().run(&scenario_store(), &table).unwrap_err();
    assert_eq!(err, SurvivalError::StatusCoding { found: vec![0, 1, 3] });
    assert!(err.is_fatal());
}
