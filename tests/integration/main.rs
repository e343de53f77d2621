//! Integration tests for nodeboot

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    /// Binary pointed at an empty config file inside `dir`
    fn nodeboot(dir: &TempDir) -> Command {
        let config = dir.path().join("config.toml");
        if !config.exists() {
            std::fs::write(&config, "").unwrap();
        }
        let mut cmd = cargo_bin_cmd!("nodeboot");
        cmd.arg("--config").arg(config);
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Node bootstrap and cloud identity resolution",
            ));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("nodeboot"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("[bootstrap]")
                    .and(predicate::str::contains("[identity]")),
            );
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.toml");

        cargo_bin_cmd!("nodeboot")
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("retry_interval_secs = 60"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[identity\n").unwrap();

        nodeboot(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn identify_rejects_malformed_provider_id() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["identify", "gce:///us-central1-a/vm-1", "--region", "us-east-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not recognized"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn identify_requires_provider_id_for_node() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["identify", "", "--node", "worker-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("providerID was not set for node worker-1"));
    }

    #[test]
    fn fetch_skips_verified_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nodeup");
        std::fs::write(&dest, b"agent binary").unwrap();
        let hash = hex::encode(Sha256::digest(b"agent binary"));

        nodeboot(&dir)
            .arg("fetch")
            .arg("--dest")
            .arg(&dest)
            .args(["--hash", &hash, "http://127.0.0.1:9/nodeup"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already present"));
    }

    #[test]
    fn fetch_rejects_uppercase_hash() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nodeup");
        std::fs::write(&dest, b"agent").unwrap();
        let hash = hex::encode(Sha256::digest(b"agent")).to_uppercase();

        nodeboot(&dir)
            .arg("fetch")
            .arg("--dest")
            .arg(&dest)
            .args(["--hash", &hash, "http://127.0.0.1:9/nodeup"])
            .timeout(std::time::Duration::from_secs(10))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid --hash"));

        assert_eq!(std::fs::read(&dest).unwrap(), b"agent");
    }

    #[test]
    fn fetch_rejects_short_hash() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nodeup");

        nodeboot(&dir)
            .arg("fetch")
            .arg("--dest")
            .arg(&dest)
            .args(["--hash", "abc123", "http://127.0.0.1:9/nodeup"])
            .timeout(std::time::Duration::from_secs(10))
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected 64 hex characters, got 6"));

        assert!(!dest.exists());
    }

    #[test]
    fn bootstrap_unknown_architecture_fails_fast() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["bootstrap", "--arch", "sparc64"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported architecture: sparc64"));
    }

    #[test]
    fn bootstrap_without_artifact_fails_fast() {
        let dir = TempDir::new().unwrap();
        nodeboot(&dir)
            .args(["bootstrap", "--arch", "arm64"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No artifact configured for architecture arm64"));
    }
}
