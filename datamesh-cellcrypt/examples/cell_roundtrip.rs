use datamesh_cellcrypt::{CellCipher, CellCryptConfig};
use datamesh_records::Record;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cipher = CellCipher::new(CellCryptConfig::sample());
    let riders = vec![
        Record::new()
            .with("id", "rider-001")
            .with("card_number", "5100-2201-9932")
            .with("home_stop", "Trindade"),
        Record::new()
            .with("id", "rider-002")
            .with("card_number", "5100-4419-0007")
            .with("home_stop", "Bolhão"),
    ];

    let sealed = cipher.encrypt(&riders, "id", &["card_number", "home_stop"])?;
    println!(
        "[cellcrypt] sealed {} rows; cipher dataset:\n{}",
        sealed.ciphertexts.len(),
        serde_json::to_string_pretty(&sealed.ciphertexts)?
    );
    println!(
        "[cellcrypt] key dataset ({} rows, store separately)",
        sealed.keys.len()
    );

    let opened = cipher.decrypt(
        &sealed.ciphertexts,
        &sealed.keys,
        "id",
        &["card_number", "home_stop"],
    )?;
    println!("[cellcrypt] recovered plaintext matches: {}", opened.records == riders);
    Ok(())
}
