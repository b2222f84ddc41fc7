use datamesh_anonymize::{AnonymizeConfig, Anonymizer, QualityEvaluator, QuasiIdentifier};
use datamesh_records::Record;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const STOPS: [&str; 5] = ["Aliados", "Bolhão", "Campanhã", "Trindade", "Sé"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let trips: Vec<Record> = (0..400)
        .map(|idx| {
            Record::new()
                .with("id", format!("trip-{idx:04}"))
                .with("age", rng.gen_range(16..85i64))
                .with("home_stop", STOPS[rng.gen_range(0..STOPS.len())])
                .with("minutes", rng.gen_range(4..95i64))
        })
        .collect();
    let qis = [
        QuasiIdentifier::numeric("age"),
        QuasiIdentifier::categorical("home_stop"),
    ];

    let evaluator = QualityEvaluator::new(AnonymizeConfig {
        parallel: true,
        ..AnonymizeConfig::default()
    });
    for point in evaluator.sweep_k(&trips, &qis, &[2, 10, 20, 40, 60, 80, 100]) {
        let point = point?;
        println!(
            "[sweep] k={:>3} classes={:>3} c_avg={:.3}",
            point.k,
            point.classes,
            point.c_avg.unwrap_or(f64::NAN)
        );
    }

    let output = Anonymizer::new(AnonymizeConfig::with_k(20)).anonymize(&trips, &qis, Some("id"))?;
    println!(
        "[anonymize] k=20 first rows:\n{}",
        serde_json::to_string_pretty(&output.records[..3])?
    );
    Ok(())
}
