//! Reports written from a real evaluation run over a mock translator.

use std::collections::HashMap;

use mteval_core::translate::mock::{MockResponse, MockTranslator};
use mteval_core::{AlignedCorpus, BleuScorer, evaluate};
use mteval_reporting::{export_csv, write_reports};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn reference_echo_gives_full_score_rows() {
    let corpus = AlignedCorpus::new(
        vec!["The cat sat.".into(), "The dog ran.".into()],
        vec!["Le chat s'est assis.".into(), "Le chien a couru.".into()],
    )
    .unwrap();
    let table: HashMap<String, String> = corpus
        .sources()
        .iter()
        .cloned()
        .zip(corpus.references().iter().cloned())
        .collect();
    let translator = MockTranslator::new(MockResponse::Lookup(table));

    let evaluation = evaluate(
        &corpus,
        &["general".to_string()],
        "fr",
        &translator,
        &BleuScorer::default(),
        |_| {},
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = write_reports(dir.path(), "guide_fr", &evaluation, "guide.pdf", "guide_fr.pdf").unwrap();
    let csv = std::fs::read_to_string(&paths.csv).unwrap();
    assert_eq!(csv, export_csv(&evaluation));

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Source,Target,general_score,general_sentence");
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "The cat sat.,Le chat s'est assis.,100.00,Le chat s'est assis.");
    assert_eq!(lines[2], "The dog ran.,Le chien a couru.,100.00,Le chien a couru.");
}
