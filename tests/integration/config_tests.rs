use reclaim::config::{ConfigError, ScanConfig};
use reclaim::duplicates::{DuplicateFinder, KeepPolicy};
use std::fs;
use std::path::{Path, PathBuf};

#[test]
fn test_config_file_drives_scan() {
    figment::Jail::expect_with(|jail| {
        let root = jail.directory().join("data");
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::write(root.join("a.bin"), b"0123456789").unwrap();
        fs::write(root.join("b.bin"), b"0123456789").unwrap();
        fs::write(root.join("cache").join("c.bin"), b"0123456789").unwrap();
        fs::write(root.join("tiny1"), b"x").unwrap();
        fs::write(root.join("tiny2"), b"x").unwrap();

        jail.create_file(
            "reclaim.toml",
            &format!(
                "minimum_file_size = 5\nexcluded_paths = [{:?}]\nkeep_policy = \"shallowest_path\"\n",
                root.join("cache").display().to_string()
            ),
        )?;
        let config = ScanConfig::load(Some(Path::new("reclaim.toml")))
            .map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(config.keep_policy, Some(KeepPolicy::ShallowestPath));

        let result = DuplicateFinder::new(config)
            .find(vec![root.clone()])
            .map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].len(), 2);
        assert_eq!(result.scanned_file_count, 2);
        Ok(())
    });
}

#[test]
fn test_env_overrides() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("reclaim.toml", "partial_hash_window_bytes = 1024")?;
        jail.set_env("RECLAIM_PARTIAL_HASH_WINDOW_BYTES", "8192");
        jail.set_env("RECLAIM_USE_TRASH", "false");

        let config = ScanConfig::load(Some(Path::new("reclaim.toml")))
            .map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(config.partial_hash_window_bytes, 8192);
        assert!(!config.use_trash);
        Ok(())
    });
}

#[test]
fn test_malformed_file_is_load_error() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("reclaim.toml", "minimum_file_size = \"lots\"")?;
        let result = ScanConfig::load(Some(Path::new("reclaim.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
        Ok(())
    });
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    figment::Jail::expect_with(|_jail| {
        let config = ScanConfig::load(Some(Path::new("does-not-exist.toml")))
            .map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(config.minimum_file_size, 1024 * 1024);
        assert!(config.excluded_paths.is_empty());
        assert_eq!(config.excluded_paths, Vec::<PathBuf>::new());
        Ok(())
    });
}
