use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn help_lists_both_subcommands() {
    Command::cargo_bin("nebula")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("dispatcher"))
        .stdout(contains("worker"));
}

#[test]
fn dispatcher_run_without_database_url_fails_fast() {
    Command::cargo_bin("nebula")
        .unwrap()
        .args(["dispatcher", "run"])
        .env_remove("DATABASE_URL")
        .env_remove("NEBULA_DATABASE_URL")
        .assert()
        .failure()
        .stderr(contains("--database-url is required"));
}

#[test]
fn worker_run_without_database_url_fails_fast() {
    Command::cargo_bin("nebula")
        .unwrap()
        .args(["worker", "run"])
        .env_remove("DATABASE_URL")
        .env_remove("NEBULA_DATABASE_URL")
        .assert()
        .failure()
        .stderr(contains("--database-url is required"));
}

#[test]
fn dispatcher_run_rejects_malformed_webhook_route() {
    Command::cargo_bin("nebula")
        .unwrap()
        .args(["dispatcher", "run", "--database-url", "postgres://unused", "--webhook-route", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(contains("must be of the form"));
}
