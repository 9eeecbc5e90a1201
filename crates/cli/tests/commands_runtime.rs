use std::env;
use std::sync::{Mutex, OnceLock};

use gatepass_cli::commands::report::ReportArgs;
use gatepass_cli::commands::{doctor, migrate, report, seed, start};
use serde_json::Value;

const IN_MEMORY_DB: &[(&str, &str)] =
    &[("GATEPASS_DATABASE_URL", "sqlite::memory:"), ("GATEPASS_DATABASE_MAX_CONNECTIONS", "1")];

#[test]
fn start_returns_success_with_valid_env() {
    with_env(IN_MEMORY_DB, || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("0 stored requests"), "unexpected message: {message}");
        assert!(message.contains("127.0.0.1:5000"), "unexpected message: {message}");
    });
}

#[test]
fn start_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("GATEPASS_DATABASE_URL", "postgres://localhost/gatepass")], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(IN_MEMORY_DB, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_returns_deterministic_request_summary() {
    with_env(IN_MEMORY_DB, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("demo dataset loaded (7 requests):"));
        for id in gatepass_db::DemoSeedDataset::ids() {
            assert!(message.contains(&format!("  - {id}: ")), "summary is missing {id}");
        }
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = sqlite_url(&dir);

    with_env(&[("GATEPASS_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);

        let all = report::run(ReportArgs::default());
        assert_eq!(parse_payload(&all.output)["data"]["count"], 7);
    });
}

#[test]
fn report_filters_seeded_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = sqlite_url(&dir);

    with_env(&[("GATEPASS_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = report::run(ReportArgs {
            requester_role: Some("staff".to_string()),
            ..ReportArgs::default()
        });
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "report");
        assert_eq!(payload["data"]["count"], 2);
        assert_eq!(payload["data"]["stats"]["total"], 2);
        let requests = payload["data"]["requests"].as_array().cloned().unwrap_or_default();
        assert!(requests.iter().all(|request| request["requesterRole"] == "staff"));

        let approved = report::run(ReportArgs {
            status: Some("approved".to_string()),
            ..ReportArgs::default()
        });
        assert_eq!(parse_payload(&approved.output)["data"]["count"], 2);
    });
}

#[test]
fn report_rejects_invalid_filters_before_touching_the_database() {
    with_env(&[("GATEPASS_DATABASE_URL", "postgres://unreachable")], || {
        let result = report::run(ReportArgs {
            from: Some("2026-03-10".to_string()),
            to: Some("2026-03-01".to_string()),
            ..ReportArgs::default()
        });
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "validation_error");
    });
}

#[test]
fn doctor_flags_pending_migrations_until_migrate_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = sqlite_url(&dir);

    with_env(&[("GATEPASS_DATABASE_URL", url.as_str())], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let payload = parse_payload(&before.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "database_connectivity");
        assert_eq!(payload["checks"][1]["status"], "pass");
        assert_eq!(payload["checks"][2]["name"], "schema_migrations");
        assert_eq!(payload["checks"][2]["status"], "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0, "unexpected output: {}", after.output);
        assert_eq!(parse_payload(&after.output)["overall_status"], "pass");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    let vars = [("GATEPASS_DATABASE_URL", "sqlite::memory:"), ("GATEPASS_DATABASE_TIMEOUT_SECS", "0")];
    with_env(&vars, || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] database_connectivity"));
        assert!(result.output.contains("- [skip] schema_migrations"));
    });
}

fn sqlite_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("gatepass.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GATEPASS_DATABASE_URL",
        "GATEPASS_DATABASE_MAX_CONNECTIONS",
        "GATEPASS_DATABASE_TIMEOUT_SECS",
        "GATEPASS_SERVER_BIND_ADDRESS",
        "GATEPASS_SERVER_PORT",
        "GATEPASS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GATEPASS_LOGGING_LEVEL",
        "GATEPASS_LOGGING_FORMAT",
        "GATEPASS_LOG_LEVEL",
        "GATEPASS_LOG_FORMAT",
        "PORT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
