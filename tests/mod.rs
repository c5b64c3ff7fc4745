//! Main test module for filewarden
//!
//! This module includes all test suites:
//! - Integration tests for backup / tamper / reconcile cycles
//! - Property-based tests for invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::filewarden::*;
    use std::fs;
    use tempfile::TempDir;

    fn warden_in(home: &TempDir) -> Warden {
        WardenBuilder::new(home.path())
            .staging_dir(home.path().join("staging"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_directory() {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = warden_in(&home);

        let report = warden.backup(guarded.path(), true).unwrap();
        assert_eq!(report.files_backed_up(), 0);
        assert!(warden.tracked_files().unwrap().is_empty());

        // Nothing tracked means nothing to reconcile
        let report = warden.reconcile().unwrap();
        assert_eq!(report.files_checked, 0);
    }

    #[test]
    fn test_special_filenames() {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = warden_in(&home);

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file_with_underscores.txt",
            "file.multiple.dots.txt",
            "UPPERCASE.TXT",
            "ファイル.txt",
            "файл.txt",
            "pipes|in|name.txt",
        ];

        for name in &special_names {
            fs::write(guarded.path().join(name), format!("content of {}\n", name)).unwrap();
        }

        let report = warden.backup(guarded.path(), true).unwrap();
        assert_eq!(report.created.len(), special_names.len());

        for name in &special_names {
            fs::write(guarded.path().join(name), "tampered\n").unwrap();
        }

        let report = warden.reconcile().unwrap();
        assert_eq!(report.modified.len(), special_names.len());

        for name in &special_names {
            let content = fs::read_to_string(guarded.path().join(name)).unwrap();
            assert_eq!(content, format!("content of {}\n", name));
        }
    }

    #[test]
    fn test_file_without_trailing_newline() {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = warden_in(&home);
        let file = guarded.path().join("motd");

        fs::write(&file, "welcome").unwrap();
        warden.backup(&file, true).unwrap();
        fs::write(&file, "welcome\nintruder").unwrap();

        warden.reconcile().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "welcome");

        let log = warden.change_log(Some(&file)).unwrap();
        assert_eq!(log[0].diff_text, "@@ -2,0 +2,1 @@\n+intruder\n");
    }

    #[test]
    fn test_replaced_by_directory() {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = warden_in(&home);
        let file = guarded.path().join("settings");

        fs::write(&file, "key = value\n").unwrap();
        warden.backup(&file, true).unwrap();

        // A directory squatting on a tracked path is a failure, not a crash
        fs::remove_file(&file).unwrap();
        fs::create_dir(&file).unwrap();
        fs::write(file.join("inner"), "x").unwrap();

        let report = warden.reconcile().unwrap();
        assert_eq!(report.files_checked, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.modified.is_empty());
        assert!(file.join("inner").exists());
    }

    #[test]
    fn test_large_file() {
        let guarded = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let warden = warden_in(&home);
        let file = guarded.path().join("large.log");

        let content: String = (0..50_000).map(|i| format!("line {}\n", i)).collect();
        fs::write(&file, &content).unwrap();
        warden.backup(&file, true).unwrap();

        fs::write(&file, content.replace("line 25000\n", "line 25000 edited\n")).unwrap();
        let report = warden.reconcile().unwrap();

        assert_eq!(report.modified, vec![file.clone()]);
        assert_eq!(fs::read_to_string(&file).unwrap(), content);

        let log = warden.change_log(Some(&file)).unwrap();
        assert_eq!(
            log[0].diff_text,
            "@@ -25001,1 +25001,1 @@\n-line 25000\n+line 25000 edited\n"
        );
    }
}
