//! Property-based testing for filewarden
//!
//! Uses proptest to check codec, diff and index invariants across randomly
//! generated inputs.

use ::filewarden::diff::{compute_line_diff, count_changes};
use ::filewarden::fingerprint::{hash_data, hash_reader};
use ::filewarden::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

/// Rebuild the new side from the old side plus hunks
fn apply_hunks(old: &[String], hunks: &[DiffHunk]) -> Vec<String> {
    let mut result = Vec::new();
    let mut cursor = 0;

    for hunk in hunks {
        let start = hunk.from_line - 1;
        result.extend_from_slice(&old[cursor..start]);
        for change in &hunk.changes {
            if let LineChange::Added(_, line) = change {
                result.push(line.clone());
            }
        }
        cursor = start + hunk.from_count;
    }

    result.extend_from_slice(&old[cursor..]);
    result
}

/// Lines from a tiny alphabet so both sides share many lines
fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abc]{0,2}", 0..20)
}

/// One step of a backup sequence: which file, what content
fn backup_step_strategy() -> impl Strategy<Value = (usize, Vec<u8>)> {
    (0..4usize, prop::collection::vec(any::<u8>(), 0..64))
}

proptest! {
    #[test]
    fn prop_codec_round_trip(content in prop::collection::vec(any::<u8>(), 0..8192), level in 1..10i32) {
        let codec = ArchiveCodec::new(level);

        let mut compressed = Vec::new();
        codec.compress(&content[..], &mut compressed).unwrap();

        let mut restored = Vec::new();
        codec.decompress(&compressed[..], &mut restored).unwrap();
        prop_assert_eq!(restored, content);
    }

    #[test]
    fn prop_streamed_hash_matches_buffered(content in prop::collection::vec(any::<u8>(), 0..20_000)) {
        prop_assert_eq!(hash_reader(&content[..]).unwrap(), hash_data(&content));
    }

    #[test]
    fn prop_diff_reconstructs_new_side(old in lines_strategy(), new in lines_strategy()) {
        let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
        let hunks = compute_line_diff(&old_refs, &new_refs);

        prop_assert_eq!(apply_hunks(&old, &hunks), new.clone());

        let (added, deleted) = count_changes(&hunks);
        prop_assert_eq!(added as i64 - deleted as i64, new.len() as i64 - old.len() as i64);

        if old == new {
            prop_assert!(hunks.is_empty());
        }
    }

    #[test]
    fn prop_ledger_line_parses_back(
        name in "[a-zA-Z0-9_.-]{1,20}",
        artifact in "[a-zA-Z0-9]{15}",
        hash in "[a-zA-Z0-9+/]{43}=",
    ) {
        let line = LedgerLine {
            filepath: std::path::PathBuf::from(format!("/srv/{}", name)),
            display_name: name.clone(),
            artifact_name: format!("{}.zst", artifact),
            time: "2024-01-01T00:00:00Z".to_string(),
            hash,
        };
        prop_assert_eq!(LedgerLine::parse(&line.to_string()), Some(line));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_one_record_per_path(steps in prop::collection::vec(backup_step_strategy(), 1..12)) {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = WardenBuilder::new(home.path())
            .staging_dir(home.path().join("staging"))
            .build()
            .unwrap();

        let mut backed_up = BTreeSet::new();
        for (file_idx, content) in &steps {
            let path = guarded.path().join(format!("file_{}", file_idx));
            fs::write(&path, content).unwrap();
            warden.backup(&path, true).unwrap();
            if !content.is_empty() {
                backed_up.insert(path);
            }
        }

        let tracked = warden.tracked_files().unwrap();
        let unique: BTreeSet<_> = tracked.iter().map(|r| r.filepath.clone()).collect();
        prop_assert_eq!(unique.len(), tracked.len());
        prop_assert_eq!(unique, backed_up);

        // Replaced artifacts are cleaned up
        let artifacts = fs::read_dir(&warden.config().backup_dir).unwrap().count();
        prop_assert_eq!(artifacts, tracked.len());
    }
}
