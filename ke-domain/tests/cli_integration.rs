// ke-domain/tests/cli_integration.rs

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::process::Output;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from the user's config files and KE_* variables.
fn ke_domain(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ke-domain").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("KE_API_URL")
        .env_remove("KE_TIMEOUT")
        .env_remove("KE_DEBOUNCE")
        .env_remove("KE_INCLUDE_PRICING")
        .env_remove("KE_CONFIG")
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(30));
    cmd
}

async fn run(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// =============================================================================
// Argument handling (no network)
// =============================================================================

#[test]
fn test_help_lists_flags() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--check"))
        .stdout(predicate::str::contains("--price"))
        .stdout(predicate::str::contains("--list-extensions"))
        .stdout(predicate::str::contains("--interactive"))
        .stdout(predicate::str::contains("--no-pricing"));
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_mode_is_an_error() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("You must specify"));
}

#[test]
fn test_conflicting_modes_rejected() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .args(["mybrand", "--check", "mybrand.co.ke"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Use only one of"));
}

#[test]
fn test_invalid_timeout_rejected() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .args(["mybrand", "--timeout", "eventually"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timeout"));
}

#[test]
fn test_unsearchable_query_rejected() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .args(["a!", "--api-url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid query"));
}

#[test]
fn test_list_extensions() {
    let home = TempDir::new().unwrap();
    ke_domain(&home)
        .arg("--list-extensions")
        .assert()
        .success()
        .stdout(predicate::str::contains(".co.ke"))
        .stdout(predicate::str::contains(".me.ke"))
        .stdout(predicate::str::contains(".go.ke"));
}

#[test]
fn test_list_extensions_json() {
    let home = TempDir::new().unwrap();
    let output = ke_domain(&home)
        .args(["--list-extensions", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let extensions = stdout_json(&output);
    let extensions = extensions.as_array().unwrap();
    assert_eq!(extensions.len(), 10);
    assert_eq!(extensions[0]["ext"], ".co.ke");
    assert_eq!(extensions[0]["popular"], true);
}

// =============================================================================
// Configuration files
// =============================================================================

#[test]
fn test_local_config_overrides_catalog() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("ke-domain.toml"),
        r#"
[[extensions]]
ext = ".co.ke"
description = "Companies"
popular = true

[[extensions]]
ext = ".or.ke"
description = "Organisations"
"#,
    )
    .unwrap();

    let output = ke_domain(&home)
        .args(["--list-extensions", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output).as_array().unwrap().len(), 2);
}

#[test]
fn test_explicit_config_must_be_valid() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("broken.toml");
    fs::write(&config, "[api]\nbase_url = \"registry.ke\"\n").unwrap();

    ke_domain(&home)
        .args(["mybrand", "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_config_from_environment() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "[[extensions]]\next = \".ke\"\npopular = true\n").unwrap();

    let output = ke_domain(&home)
        .env("KE_CONFIG", &config)
        .args(["--list-extensions", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let extensions = stdout_json(&output);
    assert_eq!(extensions.as_array().unwrap().len(), 1);
    assert_eq!(extensions[0]["ext"], ".ke");
}

// =============================================================================
// Against a mock registrar
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_json_ranks_available_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/availability/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "mybrand.co.ke": { "status": "taken" },
                "mybrand.me.ke": { "status": "available" },
                "mybrand.or.ke": { "available": true }
            }
        })))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = ke_domain(&home);
    cmd.args(["MyBrand", "--json", "--api-url", &server.uri(), "--timeout", "5s"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result = stdout_json(&output);
    assert_eq!(result["label"], "mybrand");

    let suggestions = result["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 10);
    assert_eq!(suggestions[0]["domain"], "mybrand.me.ke");
    assert_eq!(suggestions[1]["domain"], "mybrand.or.ke");

    let co_ke = suggestions
        .iter()
        .find(|s| s["domain"] == "mybrand.co.ke")
        .unwrap();
    assert_eq!(co_ke["available"], false);
    assert_eq!(co_ke["price_display"], "Contact for pricing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_reports_every_domain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/availability/batch"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/availability/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "available": true }
        })))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = ke_domain(&home);
    cmd.args([
        "--check",
        "a.co.ke,b.me.ke",
        "--check",
        "A.CO.KE",
        "--json",
        "--api-url",
        &server.uri(),
    ]);
    let output = run(cmd).await;
    assert!(output.status.success());

    let results = stdout_json(&output);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["domain"], "a.co.ke");
    assert_eq!(results[0]["status"], "available");
    assert_eq!(results[1]["domain"], "b.me.ke");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_price_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pricing/co.ke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "currency": "KES",
                "registration_by_term": { "1_year": 1200, "2_years": 2300 },
                "renewal_by_term": { "1_year": 1500 }
            }
        })))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = ke_domain(&home);
    cmd.args(["--price", ".co.ke,ac.ke", "--api-url", &server.uri()]);
    let output = run(cmd).await;

    output
        .assert()
        .success()
        .stdout(predicate::str::contains(".co.ke"))
        .stdout(predicate::str::contains("1200.00"))
        .stdout(predicate::str::contains("2300.00"))
        .stdout(predicate::str::contains(".ac.ke"))
        .stdout(predicate::str::contains("Contact for pricing"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interactive_searches_last_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/availability/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "duka.ke": { "available": true } }
        })))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = ke_domain(&home);
    cmd.env("KE_DEBOUNCE", "50ms")
        .args(["--interactive", "--api-url", &server.uri(), "--timeout", "5s"])
        .write_stdin("du\nduk\nduka\n");
    let output = run(cmd).await;

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("duka.ke"))
        .stdout(predicate::str::contains("AVAILABLE"));
}
