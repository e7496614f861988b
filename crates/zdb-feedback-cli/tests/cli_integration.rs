use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{now}"));
    fs::create_dir_all(&dir)
        .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
    dir
}

fn run_zdb<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_zdb"))
        .args(args)
        .output()
        .unwrap_or_else(|err| panic!("failed to execute zdb binary: {err}"))
}

fn run_json<I, S>(args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_zdb(args);
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "zdb command failed (status={}):\nstdout:\n{}\nstderr:\n{}",
            output.status, stdout, stderr
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("stdout is not valid JSON: {err}\nstdout:\n{stdout}"))
}

fn as_i64(value: &Value, key: &str) -> i64 {
    value
        .get(key)
        .and_then(Value::as_i64)
        .unwrap_or_else(|| panic!("missing integer field `{key}` in payload: {value}"))
}

fn as_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field `{key}` in payload: {value}"))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap_or_else(|| panic!("path should be valid UTF-8: {}", path.display()))
}

fn db_arg(dir: &Path) -> String {
    path_str(&dir.join("zdb_feedback.sqlite3")).to_string()
}

fn login_teacher(db: &str) {
    let value = run_json([
        "--db",
        db,
        "teacher",
        "login",
        "--email",
        "testuser@schule.bayern.de",
        "--password",
        "password",
    ]);
    assert_eq!(value.get("authenticated"), Some(&Value::Bool(true)));
}

fn login_backend(db: &str) {
    let value = run_json([
        "--db", db, "backend", "login", "--username", "admin", "--password", "password",
    ]);
    assert_eq!(value.get("authenticated"), Some(&Value::Bool(true)));
}

fn submit_feedback(db: &str, subject: &str, priority: &str, anonymous: bool) -> Value {
    let mut args = vec![
        "--db",
        db,
        "feedback",
        "submit",
        "--school",
        "Gymnasium Freising",
        "--district",
        "Oberbayern",
        "--category",
        "Digitale Infrastruktur und Technik",
        "--priority",
        priority,
        "--subject",
        subject,
        "--message",
        "Das WLAN fällt im Altbau täglich aus.",
    ];
    if anonymous {
        args.push("--anonymous");
    }
    run_json(args)
}

#[test]
fn migrate_reports_versions_and_contract() {
    let dir = unique_temp_dir("zdb-migrate");
    let db = db_arg(&dir);

    let value = run_json(["--db", db.as_str(), "db", "migrate"]);
    assert_eq!(as_str(&value, "contract_version"), "zdb-cli.v1");
    assert_eq!(as_i64(&value, "after_version"), 1);

    let version = run_json(["--db", db.as_str(), "db", "schema-version"]);
    assert_eq!(as_i64(&version, "schema_version"), 1);
}

#[test]
fn feedback_submit_requires_a_teacher_session() {
    let dir = unique_temp_dir("zdb-gate-teacher");
    let db = db_arg(&dir);
    run_json(["--db", db.as_str(), "db", "migrate"]);

    let output = run_zdb([
        "--db",
        db.as_str(),
        "feedback",
        "submit",
        "--category",
        "Digitale Infrastruktur und Technik",
        "--priority",
        "hoch",
        "--subject",
        "WLAN",
        "--message",
        "Ausfall",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("teacher session"), "unexpected stderr: {stderr}");
}

#[test]
fn stats_require_a_backend_session() {
    let dir = unique_temp_dir("zdb-gate-backend");
    let db = db_arg(&dir);
    run_json(["--db", db.as_str(), "db", "migrate"]);

    let output = run_zdb(["--db", db.as_str(), "stats"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("backend session"), "unexpected stderr: {stderr}");

    // A teacher session does not confer backend access.
    login_teacher(db.as_str());
    let output = run_zdb(["--db", db.as_str(), "stats"]);
    assert!(!output.status.success());
}

#[test]
fn feedback_flows_from_submit_to_stats_and_insights() {
    let dir = unique_temp_dir("zdb-feedback-flow");
    let db = db_arg(&dir);
    login_teacher(db.as_str());

    let submitted = submit_feedback(db.as_str(), "WLAN im Altbau", "dringend", false);
    let record = submitted
        .get("record")
        .unwrap_or_else(|| panic!("missing record in payload: {submitted}"));
    assert_eq!(as_str(record, "status"), "Eingereicht");
    assert_eq!(as_str(record, "name"), "Test User");
    assert_eq!(as_str(record, "email"), "testuser@schule.bayern.de");

    submit_feedback(db.as_str(), "Beamer defekt", "mittel", false);

    login_backend(db.as_str());
    let listed = run_json(["--db", db.as_str(), "feedback", "list"]);
    assert_eq!(as_i64(&listed, "total"), 2);
    let records = listed
        .get("records")
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("missing records array: {listed}"));
    // Newest submission first, as the dashboard shows.
    assert_eq!(as_str(&records[0], "subject"), "Beamer defekt");
    assert_eq!(as_str(&records[1], "subject"), "WLAN im Altbau");

    let stats = run_json(["--db", db.as_str(), "stats"]);
    assert_eq!(as_i64(&stats, "total_feedback"), 2);
    assert_eq!(as_i64(&stats, "urgent_issues"), 1);
    let categories = stats
        .get("category_distribution")
        .unwrap_or_else(|| panic!("missing category_distribution: {stats}"));
    assert_eq!(
        categories.get("Digitale Infrastruktur und Technik"),
        Some(&Value::from(2))
    );

    let insights = run_json(["--db", db.as_str(), "insights"]);
    let analysis = insights
        .get("analysis")
        .unwrap_or_else(|| panic!("missing analysis in payload: {insights}"));
    assert_eq!(as_i64(analysis, "total_feedback"), 2);
    assert_eq!(as_i64(analysis, "sentiment_score"), 72);
}

#[test]
fn anonymous_submission_is_redacted_in_the_stored_record() {
    let dir = unique_temp_dir("zdb-anonymous");
    let db = db_arg(&dir);
    login_teacher(db.as_str());

    let submitted = submit_feedback(db.as_str(), "Datenschutzfrage", "niedrig", true);
    let record = submitted
        .get("record")
        .unwrap_or_else(|| panic!("missing record in payload: {submitted}"));
    assert_eq!(as_str(record, "name"), "Anonym");
    assert_eq!(as_str(record, "email"), "");

    login_backend(db.as_str());
    let listed = run_json(["--db", db.as_str(), "feedback", "list"]);
    let records = listed
        .get("records")
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("missing records array: {listed}"));
    assert_eq!(as_str(&records[0], "name"), "Anonym");
}

#[test]
fn insights_with_no_feedback_return_the_no_data_result() {
    let dir = unique_temp_dir("zdb-no-data");
    let db = db_arg(&dir);
    login_backend(db.as_str());

    let insights = run_json(["--db", db.as_str(), "insights"]);
    assert_eq!(insights.get("analysis"), Some(&Value::Null));
    assert_eq!(as_str(&insights, "message"), "no feedback records to analyze");
}

#[test]
fn poll_results_cover_the_catalog_and_tally_submissions() {
    let dir = unique_temp_dir("zdb-poll");
    let db = db_arg(&dir);
    login_teacher(db.as_str());

    run_json([
        "--db",
        db.as_str(),
        "poll",
        "submit",
        "--response",
        "workload_2024=Zu hoch",
        "--response",
        "digital_equipment=Mangelhaft",
    ]);
    run_json([
        "--db",
        db.as_str(),
        "poll",
        "submit",
        "--response",
        "workload_2024=Zu hoch",
        "--anonymous",
    ]);

    // Options outside the catalog are rejected up front.
    let bad = run_zdb([
        "--db",
        db.as_str(),
        "poll",
        "submit",
        "--response",
        "workload_2024=Viel zu viel",
    ]);
    assert!(!bad.status.success());

    login_backend(db.as_str());
    let results = run_json(["--db", db.as_str(), "poll", "results"]);
    assert_eq!(as_i64(&results, "total_submissions"), 2);

    let questions = results
        .get("questions")
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("missing questions array: {results}"));
    assert_eq!(questions.len(), 5);

    let workload = questions
        .iter()
        .find(|q| q.get("id").and_then(Value::as_str) == Some("workload_2024"))
        .unwrap_or_else(|| panic!("missing workload_2024 question: {results}"));
    assert_eq!(as_i64(workload, "total_responses"), 2);
    let options = workload
        .get("options")
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("missing options array: {workload}"));
    let zu_hoch = options
        .iter()
        .find(|o| o.get("option").and_then(Value::as_str) == Some("Zu hoch"))
        .unwrap_or_else(|| panic!("missing Zu hoch option: {workload}"));
    assert_eq!(as_i64(zu_hoch, "count"), 2);
    assert_eq!(as_i64(zu_hoch, "percentage"), 100);
}

#[test]
fn registration_login_and_logout_round_trip() {
    let dir = unique_temp_dir("zdb-register");
    let db = db_arg(&dir);
    run_json(["--db", db.as_str(), "db", "migrate"]);

    let registered = run_json([
        "--db",
        db.as_str(),
        "teacher",
        "register",
        "--email",
        "anna.schmidt@schule.bayern.de",
        "--first-name",
        "Anna",
        "--last-name",
        "Schmidt",
        "--password",
        "geheim1",
        "--confirm-password",
        "geheim1",
    ]);
    let identity = registered
        .get("registered")
        .unwrap_or_else(|| panic!("missing registered identity: {registered}"));
    assert_eq!(as_str(identity, "email"), "anna.schmidt@schule.bayern.de");

    // Wrong-domain registration fails with a nonzero exit.
    let bad = run_zdb([
        "--db",
        db.as_str(),
        "teacher",
        "register",
        "--email",
        "anna.schmidt@gmail.com",
        "--first-name",
        "Anna",
        "--last-name",
        "Schmidt",
        "--password",
        "geheim1",
        "--confirm-password",
        "geheim1",
    ]);
    assert!(!bad.status.success());

    let login = run_json([
        "--db",
        db.as_str(),
        "teacher",
        "login",
        "--email",
        "anna.schmidt@schule.bayern.de",
        "--password",
        "geheim1",
    ]);
    assert_eq!(login.get("authenticated"), Some(&Value::Bool(true)));

    let status = run_json(["--db", db.as_str(), "session", "status"]);
    let teacher = status
        .get("teacher")
        .unwrap_or_else(|| panic!("missing teacher session: {status}"));
    assert_eq!(teacher.get("authenticated"), Some(&Value::Bool(true)));
    let backend = status
        .get("backend")
        .unwrap_or_else(|| panic!("missing backend session: {status}"));
    assert_eq!(backend.get("authenticated"), Some(&Value::Bool(false)));

    run_json(["--db", db.as_str(), "teacher", "logout"]);
    let status = run_json(["--db", db.as_str(), "session", "status"]);
    let teacher = status
        .get("teacher")
        .unwrap_or_else(|| panic!("missing teacher session: {status}"));
    assert_eq!(teacher.get("authenticated"), Some(&Value::Bool(false)));
}

#[test]
fn failed_login_is_a_generic_refusal_not_an_error() {
    let dir = unique_temp_dir("zdb-bad-login");
    let db = db_arg(&dir);
    run_json(["--db", db.as_str(), "db", "migrate"]);

    let login = run_json([
        "--db",
        db.as_str(),
        "teacher",
        "login",
        "--email",
        "testuser@schule.bayern.de",
        "--password",
        "wrong",
    ]);
    assert_eq!(login.get("authenticated"), Some(&Value::Bool(false)));
    assert_eq!(as_str(&login, "message"), "invalid credentials");

    let unknown = run_json([
        "--db",
        db.as_str(),
        "teacher",
        "login",
        "--email",
        "nobody@schule.bayern.de",
        "--password",
        "password",
    ]);
    assert_eq!(as_str(&unknown, "message"), "invalid credentials");
}

#[test]
fn sessions_persist_across_processes() {
    let dir = unique_temp_dir("zdb-session-persist");
    let db = db_arg(&dir);
    login_backend(db.as_str());

    // A fresh process sees the persisted backend session.
    let stats = run_json(["--db", db.as_str(), "stats"]);
    assert_eq!(as_i64(&stats, "total_feedback"), 0);
}
