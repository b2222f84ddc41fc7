use approx::assert_relative_eq;
use datamesh_anonymize::{
    AnonymizeConfig, AnonymizeError, AnonymizeWarning, Anonymizer, QualityEvaluator,
    QuasiIdentifier,
};
use datamesh_records::{ErrorMode, Record, ValidationError, Value};
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const ZIPS: [&str; 6] = ["10115", "10117", "10119", "20095", "20097", "80331"];

fn random_people(count: usize, seed: u64) -> Vec<Record> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..count)
        .map(|idx| {
            Record::new()
                .with("id", idx as i64)
                .with("age", rng.gen_range(18..90i64))
                .with("income", rng.gen_range(10_000.0..150_000.0))
                .with("zip", ZIPS[rng.gen_range(0..ZIPS.len())])
                .with("diagnosis", if rng.gen_bool(0.3) { "flu" } else { "none" })
        })
        .collect()
}

fn qis() -> Vec<QuasiIdentifier> {
    vec![
        QuasiIdentifier::numeric("age"),
        QuasiIdentifier::numeric("income"),
        QuasiIdentifier::categorical("zip"),
    ]
}

fn anonymizer(k: usize) -> Anonymizer {
    Anonymizer::new(AnonymizeConfig::with_k(k))
}

#[test]
fn small_table_forms_one_generalized_class() {
    let records = vec![
        Record::new().with("id", 1).with("age", 25).with("zip", "1000"),
        Record::new().with("id", 2).with("age", 27).with("zip", "1000"),
        Record::new().with("id", 3).with("age", 40).with("zip", "2000"),
    ];
    let qis = [
        QuasiIdentifier::numeric("age"),
        QuasiIdentifier::categorical("zip"),
    ];
    let output = anonymizer(2).anonymize(&records, &qis, None).unwrap();

    let run = &output.partitioning;
    assert_eq!(run.classes.len(), 1);
    assert_eq!(run.classes[0].members, vec![0, 1, 2]);
    assert!(run.warnings.is_empty());
    for (idx, record) in output.records.iter().enumerate() {
        assert_eq!(record.get("id"), Some(&Value::Integer(idx as i64 + 1)));
        assert_eq!(record.get("age"), Some(&Value::text("[25–40]")));
        assert_eq!(record.get("zip"), Some(&Value::text("{1000,2000}")));
    }
}

#[test]
fn every_class_has_at_least_k_members() {
    let records = random_people(500, 7);
    for k in [1, 2, 5, 10, 37, 100, 500] {
        let run = anonymizer(k).partition(&records, &qis()).unwrap();
        assert!(run.is_k_anonymous(), "k={k} smallest={:?}", run.smallest_class());
        let covered: usize = run.classes.iter().map(|class| class.len()).sum();
        assert_eq!(covered, records.len());
    }
}

#[test]
fn members_of_a_class_share_every_quasi_identifier() {
    let records = random_people(300, 11);
    let output = anonymizer(8).anonymize(&records, &qis(), Some("id")).unwrap();

    for class in &output.partitioning.classes {
        for &row in &class.members {
            let record = &output.records[row];
            for qi in qis() {
                assert_eq!(record.get(&qi.name), class.generalized.get(&qi.name));
            }
            assert!(!record.contains("id"));
            assert_eq!(record.get("diagnosis"), records[row].get("diagnosis"));
        }
    }
}

#[test]
fn numeric_ranges_cover_their_members() {
    let records = random_people(200, 3);
    let output = anonymizer(5).anonymize(&records, &qis(), None).unwrap();

    for class in &output.partitioning.classes {
        let ages: Vec<i64> = class
            .members
            .iter()
            .map(|&row| match records[row].get("age") {
                Some(Value::Integer(age)) => *age,
                other => panic!("unexpected age {other:?}"),
            })
            .collect();
        let (min, max) = (ages.iter().min().unwrap(), ages.iter().max().unwrap());
        let expected = if min == max {
            Value::Integer(*min)
        } else {
            Value::text(format!("[{min}–{max}]"))
        };
        assert_eq!(class.generalized.get("age"), Some(&expected));
    }
}

#[test]
fn runs_are_deterministic() {
    let records = random_people(400, 21);
    let first = anonymizer(6).anonymize(&records, &qis(), None).unwrap();
    let second = anonymizer(6).anonymize(&records, &qis(), None).unwrap();
    assert_eq!(first, second);

    let parallel = Anonymizer::new(AnonymizeConfig {
        parallel: true,
        ..AnonymizeConfig::with_k(6)
    })
    .anonymize(&records, &qis(), None)
    .unwrap();
    assert_eq!(first.records, parallel.records);
    assert_eq!(first.partitioning.classes, parallel.partitioning.classes);
}

#[test]
fn c_avg_is_at_least_one() {
    let records = random_people(250, 5);
    for k in [2, 4, 9, 25, 60] {
        let run = anonymizer(k).partition(&records, &qis()).unwrap();
        let c_avg = run.normalized_average_class_size().unwrap();
        assert!(c_avg >= 1.0, "k={k} c_avg={c_avg}");
        if run.classes.iter().all(|class| class.len() == k) {
            assert_relative_eq!(c_avg, 1.0);
        }
    }
}

#[test]
fn c_avg_is_exactly_one_for_perfect_classes() {
    let records: Vec<Record> = (0..8).map(|age| Record::new().with("age", age)).collect();
    let run = anonymizer(2)
        .partition(&records, &[QuasiIdentifier::numeric("age")])
        .unwrap();
    assert_eq!(run.classes.len(), 4);
    assert_relative_eq!(run.normalized_average_class_size().unwrap(), 1.0);
}

#[test]
fn fewer_records_than_k_is_reported() {
    let records = random_people(4, 1);
    let output = anonymizer(10).anonymize(&records, &qis(), None).unwrap();
    let run = &output.partitioning;

    assert_eq!(run.classes.len(), 1);
    assert_eq!(run.classes[0].len(), 4);
    assert_eq!(
        run.warnings,
        vec![AnonymizeWarning::LowCardinality { records: 4, k: 10 }]
    );
    assert!(!run.is_k_anonymous());
    assert_relative_eq!(run.normalized_average_class_size().unwrap(), 0.4);
}

#[test]
fn suppression_drops_only_the_identifier() {
    let records = random_people(20, 9);
    let output = anonymizer(4).anonymize(&records, &qis(), Some("id")).unwrap();
    assert_eq!(output.records.len(), 20);
    for record in &output.records {
        assert!(!record.contains("id"));
        assert!(record.contains("diagnosis"));
        assert!(record.contains("age"));
    }
}

#[test]
fn numeric_text_is_accepted() {
    let records: Vec<Record> = ["19", "20", " 35 ", "36"]
        .iter()
        .map(|age| Record::new().with("age", *age))
        .collect();
    let output = anonymizer(2)
        .anonymize(&records, &[QuasiIdentifier::numeric("age")], None)
        .unwrap();
    assert_eq!(output.records[0].get("age"), Some(&Value::text("[19–20]")));
    assert_eq!(output.records[3].get("age"), Some(&Value::text("[35–36]")));
}

#[test]
fn strict_mode_aborts_on_non_numeric_value() {
    let mut records = random_people(10, 2);
    records[6].insert("age", "unknown");
    let err = anonymizer(2).anonymize(&records, &qis(), Some("id")).unwrap_err();
    let AnonymizeError::Row(failure) = err else {
        panic!("expected a row failure");
    };
    assert_eq!(failure.row, 6);
    assert_eq!(failure.entity_id.map(|id| id.to_string()).as_deref(), Some("6"));
    assert_eq!(failure.column.as_deref(), Some("age"));
    assert_eq!(
        failure.error,
        ValidationError::NotNumeric {
            column: "age".into(),
            value: "unknown".into()
        }
    );
}

#[test]
fn lenient_mode_collects_failures_and_anonymizes_the_rest() {
    let mut records = random_people(30, 4);
    records[3].remove("zip");
    records[17].insert("income", Value::Null);
    let config = AnonymizeConfig {
        error_mode: ErrorMode::Lenient,
        ..AnonymizeConfig::with_k(3)
    };
    let output = Anonymizer::new(config).anonymize(&records, &qis(), None).unwrap();
    let run = &output.partitioning;

    assert_eq!(output.records.len(), 28);
    assert_eq!(run.total_records, 28);
    assert_eq!(
        run.failures.iter().map(|f| (f.row, f.error.clone())).collect::<Vec<_>>(),
        vec![
            (3, ValidationError::MissingColumn { column: "zip".into() }),
            (17, ValidationError::NullValue { column: "income".into() }),
        ]
    );
    assert!(run
        .classes
        .iter()
        .all(|class| !class.members.contains(&3) && !class.members.contains(&17)));
    assert!(run.is_k_anonymous());
}

#[test]
fn categorical_only_split_is_balanced_by_rank() {
    let records: Vec<Record> = (0..60)
        .map(|idx| Record::new().with("zip", ZIPS[idx % ZIPS.len()]))
        .collect();
    let output = anonymizer(11)
        .anonymize(&records, &[QuasiIdentifier::categorical("zip")], None)
        .unwrap();

    let classes: Vec<Value> = output
        .partitioning
        .classes
        .iter()
        .map(|class| class.generalized.get("zip").cloned().unwrap_or_default())
        .collect();
    // Six zips of ten rows: rank 2 splits them three and three; splitting a
    // half again would leave a ten-row side.
    assert_eq!(
        classes,
        vec![
            Value::text("{10115,10117,10119}"),
            Value::text("{20095,20097,80331}"),
        ]
    );
    assert_eq!(output.records[0].get("zip"), Some(&classes[0]));
    assert_eq!(output.records[5].get("zip"), Some(&classes[1]));
}

#[test]
fn sweep_reports_finite_metrics_per_k() {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let records: Vec<Record> = (0..100)
        .map(|_| {
            Record::new()
                .with("age", rng.gen_range(0..100i64))
                .with("weight", rng.gen_range(40.0..120.0))
        })
        .collect();
    let qis = [
        QuasiIdentifier::numeric("age"),
        QuasiIdentifier::numeric("weight"),
    ];
    let metrics = QualityEvaluator::default()
        .sweep(&records, &qis, &[2, 10])
        .unwrap();

    assert_eq!(metrics.keys().copied().collect::<Vec<_>>(), vec![2, 10]);
    for (k, c_avg) in &metrics {
        assert!(c_avg.is_finite() && *c_avg >= 1.0, "k={k} c_avg={c_avg}");
    }
}

#[test]
fn sweep_never_sees_generalized_values() {
    let records = random_people(120, 8);
    let evaluator = QualityEvaluator::default();
    let points: Vec<_> = evaluator
        .sweep_k(&records, &qis(), &[2, 10, 20, 40, 60, 80, 100])
        .map(|point| point.unwrap())
        .collect();

    for point in &points {
        let fresh = anonymizer(point.k).partition(&records, &qis()).unwrap();
        assert_eq!(point.classes, fresh.classes.len());
        assert_eq!(point.c_avg, fresh.normalized_average_class_size());
        assert!(!point.low_cardinality);
    }
    assert_eq!(records, random_people(120, 8));
}
