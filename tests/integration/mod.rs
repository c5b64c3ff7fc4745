//! Integration tests for filewarden
//!
//! Exercises whole backup / tamper / reconcile cycles against real
//! directory trees.

use ::filewarden::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Test harness with a guarded tree and a filewarden home
pub struct WardenTestHarness {
    pub guarded_dir: TempDir,
    pub home_dir: TempDir,
    pub warden: Warden,
    pub file_generator: FileGenerator,
}

impl WardenTestHarness {
    /// Create a new test harness
    pub fn new() -> Self {
        let guarded_dir = TempDir::new().unwrap();
        let home_dir = TempDir::new().unwrap();

        let warden = WardenBuilder::new(home_dir.path())
            .staging_dir(home_dir.path().join("staging"))
            .build()
            .unwrap();

        Self {
            guarded_dir,
            home_dir,
            warden,
            file_generator: FileGenerator::new(42),
        }
    }

    /// Root of the guarded tree
    pub fn root(&self) -> &Path {
        self.guarded_dir.path()
    }

    /// Generate a nested tree and return path -> content for every file
    pub fn generate_tree(&mut self, config: TreeConfig) -> anyhow::Result<BTreeMap<PathBuf, Vec<u8>>> {
        let mut files = BTreeMap::new();
        let root = self.root().to_path_buf();

        for depth in 0..=config.max_depth {
            for dir_idx in 0..config.dirs_per_level {
                let mut dir = root.clone();
                for level in 0..depth {
                    dir = dir.join(format!("dir_{}_{}", level, dir_idx));
                }
                fs::create_dir_all(&dir)?;

                for file_idx in 0..config.files_per_dir {
                    let path = dir.join(format!("file_{}.conf", file_idx));
                    if files.contains_key(&path) {
                        continue;
                    }
                    let content = self
                        .file_generator
                        .generate_text(config.file_size_range.clone());
                    fs::write(&path, &content)?;
                    files.insert(path, content);
                }
            }
        }

        Ok(files)
    }

    /// Modify or delete randomly chosen files
    pub fn tamper(&mut self, files: &BTreeMap<PathBuf, Vec<u8>>, count: usize) -> anyhow::Result<Vec<Tamper>> {
        let paths: Vec<&PathBuf> = files.keys().collect();
        let mut touched = BTreeMap::new();

        for _ in 0..count {
            let path = paths[self.file_generator.rng.random_range(0..paths.len())];
            if touched.contains_key(path) {
                continue;
            }

            let tamper = if self.file_generator.rng.random_bool(0.5) {
                fs::remove_file(path)?;
                Tamper::Deleted(path.clone())
            } else {
                let mut content = files[path].clone();
                content.extend_from_slice(b"\ninjected line\n");
                fs::write(path, &content)?;
                Tamper::Modified(path.clone())
            };
            touched.insert(path.clone(), tamper);
        }

        Ok(touched.into_values().collect())
    }

    /// Assert that every file has its original content
    pub fn assert_intact(&self, files: &BTreeMap<PathBuf, Vec<u8>>) {
        for (path, content) in files {
            let live = fs::read(path).unwrap_or_else(|e| panic!("{:?} unreadable: {}", path, e));
            assert_eq!(&live, content, "content mismatch for {:?}", path);
        }
    }

    /// Number of artifacts in the backup directory
    pub fn artifact_count(&self) -> usize {
        fs::read_dir(&self.warden.config().backup_dir).unwrap().count()
    }
}

/// File generator for test data
pub struct FileGenerator {
    rng: StdRng,
}

impl FileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate newline-separated config-like text (never empty)
    pub fn generate_text(&mut self, size_range: std::ops::Range<usize>) -> Vec<u8> {
        let size = self.rng.random_range(size_range).max(1);
        let keys = ["listen", "port", "user", "group", "timeout", "log_level", "root", "allow"];
        let mut content = Vec::with_capacity(size + 32);

        while content.len() < size {
            let key = keys[self.rng.random_range(0..keys.len())];
            let value: u32 = self.rng.random_range(0..10_000);
            content.extend_from_slice(format!("{} = {}\n", key, value).as_bytes());
        }
        content
    }

    /// Generate binary content with an ELF-like header
    pub fn generate_binary(&mut self, size: usize) -> Vec<u8> {
        let mut content = vec![0u8; size.max(8)];
        self.rng.fill(&mut content[..]);
        content[..4].copy_from_slice(b"\x7fELF");
        content
    }
}

#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub dirs_per_level: usize,
    pub files_per_dir: usize,
    pub file_size_range: std::ops::Range<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            dirs_per_level: 3,
            files_per_dir: 4,
            file_size_range: 50..2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tamper {
    Modified(PathBuf),
    Deleted(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_hello_world_drift_scenario() {
        let harness = WardenTestHarness::new();
        let file = harness.root().join("a.txt");
        fs::write(&file, "hello\n").unwrap();

        harness.warden.backup(&file, true).unwrap();
        fs::write(&file, "hello\nworld\n").unwrap();

        let report = harness.warden.reconcile().unwrap();
        assert_eq!(report.modified, vec![file.clone()]);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello\n");

        let log = harness.warden.change_log(Some(&file)).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].diff_text.contains("+world"));
    }

    #[test]
    fn test_directory_backup_scenario() {
        let harness = WardenTestHarness::new();
        let dir = harness.root().join("d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("first.txt"), "1\n").unwrap();
        fs::write(dir.join("second.txt"), "2\n").unwrap();

        harness.warden.backup(&dir, true).unwrap();

        let tracked: Vec<PathBuf> = harness
            .warden
            .tracked_files()
            .unwrap()
            .into_iter()
            .map(|record| record.filepath)
            .collect();
        assert_eq!(tracked, vec![dir.join("first.txt"), dir.join("second.txt")]);
        assert_eq!(harness.artifact_count(), 2);
    }

    #[test]
    fn test_refused_overwrite_scenario() {
        let harness = WardenTestHarness::new();
        let file = harness.root().join("a.txt");
        fs::write(&file, "original\n").unwrap();

        harness.warden.backup(&file, true).unwrap();
        let before = harness.warden.tracked_files().unwrap();

        let result = harness.warden.backup(&file, false);
        assert!(matches!(result, Err(WardenError::OverwriteRefused { .. })));
        assert_eq!(harness.warden.tracked_files().unwrap(), before);
        assert_eq!(harness.artifact_count(), 1);
    }

    #[test]
    #[traced_test]
    fn test_random_tamper_is_healed() {
        let mut harness = WardenTestHarness::new();
        let files = harness.generate_tree(TreeConfig::default()).unwrap();
        let report = harness.warden.backup(harness.root(), true).unwrap();
        assert_eq!(report.created.len(), files.len());

        for round in 0..3 {
            let tampered = harness.tamper(&files, 8).unwrap();
            let modified = tampered
                .iter()
                .filter(|t| matches!(t, Tamper::Modified(_)))
                .count();
            info!("Round {}: {} files tampered, {} modified", round, tampered.len(), modified);

            let logged_before = harness.warden.stats().unwrap().change_log_entries;
            let report = harness.warden.reconcile().unwrap();

            assert_eq!(report.files_restored(), tampered.len());
            assert_eq!(report.modified.len(), modified);
            assert!(!report.has_failures());
            assert_eq!(
                harness.warden.stats().unwrap().change_log_entries,
                logged_before + modified
            );
            harness.assert_intact(&files);
        }
    }

    #[test]
    fn test_second_reconcile_is_a_no_op() {
        let mut harness = WardenTestHarness::new();
        let files = harness.generate_tree(TreeConfig::default()).unwrap();
        harness.warden.backup(harness.root(), true).unwrap();
        harness.tamper(&files, 5).unwrap();

        harness.warden.reconcile().unwrap();
        let entries = harness.warden.stats().unwrap().change_log_entries;

        let second = harness.warden.reconcile().unwrap();
        assert_eq!(second.files_restored(), 0);
        assert_eq!(second.unchanged.len(), files.len());
        assert_eq!(harness.warden.stats().unwrap().change_log_entries, entries);
    }

    #[test]
    fn test_binary_and_text_side_by_side() {
        let mut harness = WardenTestHarness::new();
        let binary = harness.root().join("tool");
        let text = harness.root().join("tool.conf");
        let binary_content = harness.file_generator.generate_binary(4096);
        fs::write(&binary, &binary_content).unwrap();
        fs::write(&text, "mode = strict\n").unwrap();
        harness.warden.backup(harness.root(), true).unwrap();

        let mut patched = binary_content.clone();
        patched[100] ^= 0xFF;
        fs::write(&binary, &patched).unwrap();
        fs::write(&text, "mode = lax\n").unwrap();

        harness.warden.reconcile().unwrap();
        assert_eq!(fs::read(&binary).unwrap(), binary_content);

        let binary_log = harness.warden.change_log(Some(&binary)).unwrap();
        assert_eq!(binary_log[0].diff_text, filewarden::diff::BINARY_NO_DIFF);
        let text_log = harness.warden.change_log(Some(&text)).unwrap();
        assert_eq!(text_log[0].diff_text, "@@ -1,1 +1,1 @@\n-mode = strict\n+mode = lax\n");
    }

    #[test]
    fn test_overwrite_after_legitimate_change() {
        let harness = WardenTestHarness::new();
        let file = harness.root().join("app.conf");
        fs::write(&file, "version = 1\n").unwrap();
        harness.warden.backup(&file, true).unwrap();

        // An operator updates the file and re-runs the backup
        fs::write(&file, "version = 2\n").unwrap();
        let report = harness.warden.backup(&file, true).unwrap();
        assert_eq!(report.overwritten, vec![file.clone()]);

        let report = harness.warden.reconcile().unwrap();
        assert_eq!(report.unchanged, vec![file.clone()]);
        assert_eq!(fs::read_to_string(&file).unwrap(), "version = 2\n");
        assert_eq!(harness.artifact_count(), 1);
    }

    #[test]
    fn test_ledger_mirrors_new_paths() {
        let mut harness = WardenTestHarness::new();
        let files = harness.generate_tree(TreeConfig {
            max_depth: 1,
            dirs_per_level: 2,
            files_per_dir: 3,
            file_size_range: 10..100,
        })
        .unwrap();

        harness.warden.backup(harness.root(), true).unwrap();
        harness.warden.backup(harness.root(), true).unwrap();

        let ledger = Ledger::new(&harness.warden.config().index_path);
        let lines = ledger.lines().unwrap();
        assert_eq!(lines.len(), files.len());

        for record in harness.warden.tracked_files().unwrap() {
            let line = ledger.latest(&record.filepath).unwrap().unwrap();
            assert_eq!(line.display_name, record.display_name);
        }
    }

    #[test]
    fn test_state_persists_across_processes() {
        let harness = WardenTestHarness::new();
        let file = harness.root().join("a.txt");
        fs::write(&file, "persist\n").unwrap();
        harness.warden.backup(&file, true).unwrap();
        fs::remove_file(&file).unwrap();

        let reopened = WardenBuilder::new(harness.home_dir.path())
            .staging_dir(harness.home_dir.path().join("staging"))
            .build()
            .unwrap();
        let report = reopened.reconcile().unwrap();
        assert_eq!(report.missing, vec![file.clone()]);
        assert_eq!(fs::read_to_string(&file).unwrap(), "persist\n");
    }
}
