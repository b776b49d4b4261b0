use anyhow::Result;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use rollcall::core::fingerprint::{name_seed, seed_from_hash, PLACEHOLDER_COUNT};
use rollcall::core::{content_hash, FingerprintStore, MatchScorer, ScoreDraw, Verifier};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Draw that returns fixed scores for chosen seeds and a floor for the rest.
struct FixedDraw {
    scores: HashMap<u64, u8>,
    floor: u8,
}

impl ScoreDraw for FixedDraw {
    fn draw(&self, seed: u64) -> u8 {
        self.scores.get(&seed).copied().unwrap_or(self.floor)
    }
}

fn combined_seed(sample: &[u8], name: &str) -> u64 {
    (seed_from_hash(&content_hash(sample)) ^ name_seed(name)) as u64
}

/// Scores `score` for `name` on `sample`, 10 for everyone else.
fn forced(sample: &[u8], name: &str, score: u8) -> MatchScorer<FixedDraw> {
    let scores = HashMap::from([(combined_seed(sample, name), score)]);
    MatchScorer::with_draw(FixedDraw { scores, floor: 10 })
}

fn roster(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn scoring_is_deterministic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let names = roster(&["Tanish", "Yuvraj", "Vishal", "Suraj", "Sanyam"]);
    let store = FingerprintStore::load(&names, dir.path());
    let sample_hash = content_hash(b"front camera frame");

    let scorer = MatchScorer::new();
    let first = scorer.score(&sample_hash, &store);
    let second = scorer.score(&sample_hash, &store);

    assert_eq!(first, second);
    assert_eq!(first.len(), names.len());
    assert!(first.iter().all(|s| s.score <= 100));
    assert_eq!(
        first.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        ["Tanish", "Yuvraj", "Vishal", "Suraj", "Sanyam"]
    );
    Ok(())
}

/// Pinned outputs; a change here means stored decisions would no longer replay.
#[test]
fn scores_match_pinned_values() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let names = roster(&["Tanish", "Yuvraj", "Vishal", "Suraj", "Sanyam"]);
    let store = FingerprintStore::load(&names, dir.path());
    let scorer = MatchScorer::new();

    assert_eq!(seed_from_hash(&content_hash(b"golden-1")), 0x2442ffee);
    assert_eq!(name_seed("Tanish"), 0xd2ac0bb9);

    let pinned: [(&[u8], [u8; 5]); 3] = [
        (b"front camera frame", [24, 12, 45, 7, 20]),
        (b"golden-1", [92, 94, 41, 64, 93]),
        (b"golden-2", [99, 49, 91, 53, 90]),
    ];
    for (sample, expected) in pinned {
        let scores: Vec<u8> = scorer
            .score(&content_hash(sample), &store)
            .iter()
            .map(|s| s.score)
            .collect();
        assert_eq!(scores, expected, "sample {:?}", String::from_utf8_lossy(sample));
    }

    let decision = scorer.decide(&content_hash(b"golden-1"), "Yuvraj", &store);
    assert!(decision.accepted);
    assert_eq!(decision.best.map(|b| b.score), Some(94));
    Ok(())
}

#[test]
fn different_samples_move_the_scores() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let names = roster(&["Tanish", "Yuvraj", "Vishal", "Suraj", "Sanyam"]);
    let store = FingerprintStore::load(&names, dir.path());
    let scorer = MatchScorer::new();

    let baseline = scorer.score(&content_hash(b"sample-0"), &store);
    let changed = (1..20)
        .map(|i| scorer.score(&content_hash(format!("sample-{}", i).as_bytes()), &store))
        .filter(|scores| *scores != baseline)
        .count();

    assert!(changed > 0, "scores never changed with the sample");
    Ok(())
}

#[test]
fn decision_has_a_single_best_identity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let names = roster(&["Tanish", "Yuvraj", "Vishal"]);
    let store = FingerprintStore::load(&names, dir.path());

    let decision = MatchScorer::new().decide(&content_hash(b"frame"), "Yuvraj", &store);
    let best = decision.best.clone().expect("non-empty roster has a best match");
    let top = decision.scores.iter().map(|s| s.score).max().unwrap_or(0);

    assert_eq!(best.score, top);
    let first_top = decision.scores.iter().find(|s| s.score == top).unwrap();
    assert_eq!(best.name, first_top.name);
    Ok(())
}

#[test]
fn empty_reference_folder_gets_placeholders() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let names = roster(&["Alice", "Bob"]);
    fs::create_dir_all(dir.path().join("Alice"))?;
    fs::create_dir_all(dir.path().join("Bob"))?;
    fs::write(dir.path().join("Bob").join("bob1.jpg"), b"bob's face")?;
    fs::write(dir.path().join("Bob").join("notes.txt"), b"not an image")?;

    let store = FingerprintStore::load(&names, dir.path());

    let alice = store.get("Alice").unwrap();
    assert!(alice.placeholder);
    assert_eq!(alice.fingerprints.len(), PLACEHOLDER_COUNT);

    let bob = store.get("Bob").unwrap();
    assert!(!bob.placeholder);
    assert_eq!(bob.fingerprints, vec![content_hash(b"bob's face")]);
    Ok(())
}

#[test]
fn missing_reference_folders_are_created() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let faces = dir.path().join("faces");

    let store = FingerprintStore::load(&roster(&["Carol"]), &faces);

    assert!(faces.join("Carol").is_dir());
    assert_eq!(store.get("Carol").unwrap().fingerprints.len(), PLACEHOLDER_COUNT);
    Ok(())
}

#[test]
fn score_of_seventy_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sample = b"borderline frame";
    let verifier = Verifier::with_scorer(
        roster(&["Alice", "Bob"]),
        dir.path().join("faces"),
        dir.path().join("recognized_faces"),
        forced(sample, "Alice", 70),
    );

    let verdict = verifier.verify(&BASE64_STANDARD.encode(sample), "Alice");

    assert!(!verdict.accepted);
    assert_eq!(verdict.message, "Face does not match Alice. Please try again.");
    assert!(verdict.saved_path.is_none());
    assert_eq!(count_files(&dir.path().join("recognized_faces").join("Alice")), 0);
    Ok(())
}

#[test]
fn score_of_seventy_one_is_accepted_and_saved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sample = b"clear frame";
    let recognized = dir.path().join("recognized_faces");
    let verifier = Verifier::with_scorer(
        roster(&["Alice", "Bob"]),
        dir.path().join("faces"),
        recognized.clone(),
        forced(sample, "Alice", 71),
    );

    let verdict = verifier.verify(&format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(sample)), "Alice");

    assert!(verdict.accepted);
    assert_eq!(verdict.message, "Face recognized for Alice");
    let saved = verdict.saved_path.expect("accepted sample is saved");
    assert!(saved.starts_with(recognized.join("Alice")));
    let file_name = saved.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("Alice_") && file_name.ends_with(".jpg"));
    assert_eq!(fs::read(&saved)?, sample);
    Ok(())
}

#[test]
fn best_match_for_someone_else_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sample = b"bob at the camera";
    let verifier = Verifier::with_scorer(
        roster(&["Alice", "Bob"]),
        dir.path().join("faces"),
        dir.path().join("recognized_faces"),
        forced(sample, "Bob", 95),
    );

    let verdict = verifier.verify(&BASE64_STANDARD.encode(sample), "Alice");

    assert!(!verdict.accepted);
    assert_eq!(verdict.message, "Face does not match Alice. Please try again.");
    assert!(!dir.path().join("recognized_faces").join("Alice").exists());
    Ok(())
}

#[test]
fn claimed_name_outside_roster_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let verifier = Verifier::new(
        roster(&["Alice"]),
        dir.path().join("faces"),
        dir.path().join("recognized_faces"),
    );

    let verdict = verifier.verify(&BASE64_STANDARD.encode(b"frame"), "Mallory");

    assert!(!verdict.accepted);
    assert_eq!(verdict.message, "No reference images found for Mallory");
    Ok(())
}

#[test]
fn real_draw_saves_only_on_acceptance() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let recognized = dir.path().join("recognized_faces");
    let verifier = Verifier::new(
        roster(&["Alice", "Bob"]),
        dir.path().join("faces"),
        recognized.clone(),
    );

    let sample = b"one still frame";
    let decision = verifier.decide_bytes(sample, "Alice");
    let verdict = verifier.verify(&BASE64_STANDARD.encode(sample), "Alice");

    assert_eq!(verdict.accepted, decision.accepted);
    assert_eq!(verdict.message, decision.message);
    let saved = count_files(&recognized.join("Alice"));
    assert_eq!(saved, if decision.accepted { 1 } else { 0 });
    Ok(())
}

#[test]
fn empty_payload_is_rejected_without_touching_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let faces = dir.path().join("faces");
    let recognized = dir.path().join("recognized_faces");
    let verifier = Verifier::new(roster(&["Alice"]), faces.clone(), recognized.clone());

    for payload in ["", "   ", "data:image/jpeg;base64,"] {
        let verdict = verifier.verify(payload, "Alice");
        assert!(!verdict.accepted);
        assert_eq!(verdict.message, "No image data provided");
    }

    assert!(!faces.exists());
    assert!(!recognized.exists());
    Ok(())
}

#[test]
fn undecodable_payload_reports_processing_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let verifier = Verifier::for_recognized_dir(roster(&["Alice"]), dir.path().join("recognized_faces"));

    let verdict = verifier.verify("data:image/jpeg;base64,@@@not-base64@@@", "Alice");

    assert!(!verdict.accepted);
    assert!(verdict.message.starts_with("Error processing image:"), "{}", verdict.message);
    assert_eq!(verifier.reference_dir(), dir.path().join("faces"));
    Ok(())
}
