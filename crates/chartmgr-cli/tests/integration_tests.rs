//! Integration tests for CLI commands

use std::io::Write;
use std::process::Command;

/// Helper to run chartmgr command
fn chartmgr(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chartmgr"))
        .args(args)
        .env_remove("CHARTMGR_CONFIG")
        .output()
        .expect("Failed to execute chartmgr")
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes()).unwrap();
    file
}

mod crd_command {
    use super::*;

    #[test]
    fn test_crd_prints_definition() {
        let output = chartmgr(&["crd"]);

        assert!(output.status.success(), "Expected success for crd");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("kind: CustomResourceDefinition"));
        assert!(stdout.contains("chartmanagers.chartmanager.logicmonitor.com"));
        assert!(stdout.contains("v1alpha1"));
    }

    #[test]
    fn test_crd_output_is_yaml() {
        let output = chartmgr(&["crd"]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        let doc: serde_yaml::Value = serde_yaml::from_str(&stdout).expect("Output should be valid YAML");
        assert_eq!(doc["spec"]["names"]["kind"].as_str(), Some("ChartManager"));
        assert_eq!(doc["spec"]["scope"].as_str(), Some("Namespaced"));
    }
}

mod config_command {
    use super::*;

    #[test]
    fn test_config_from_file() {
        let file = config_file("convergence:\n  timeout: 5m\nstatusConflictRetries: 3\n");
        let output = chartmgr(&["config", "--config", file.path().to_str().unwrap()]);

        assert!(output.status.success(), "Expected success for valid config");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("timeout: 5m"));
        assert!(stdout.contains("interval: 30s"));
        assert!(stdout.contains("statusConflictRetries: 3"));
        assert!(stdout.contains("serializePerResource: true"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = config_file("");
        let output = chartmgr(&["config", "--config", file.path().to_str().unwrap()]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("timeout: 2m"));
        assert!(stdout.contains("binary: helm"));
    }

    #[test]
    fn test_invalid_config_fails() {
        let file = config_file("convergence:\n  interval: 0s\n");
        let output = chartmgr(&["config", "--config", file.path().to_str().unwrap()]);

        assert!(!output.status.success(), "Expected failure for zero interval");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("convergence.interval"));
    }

    #[test]
    fn test_missing_config_file_fails() {
        let output = chartmgr(&["config", "--config", "/nonexistent/chartmgr.yaml"]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("/nonexistent/chartmgr.yaml"));
    }
}

mod cli_surface {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let output = chartmgr(&["--help"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("run"));
        assert!(stdout.contains("crd"));
        assert!(stdout.contains("config"));
    }

    #[test]
    fn test_run_rejects_unknown_log_format() {
        let output = chartmgr(&["run", "--log-format", "xml"]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("xml"));
    }
}
