//! Docker runtime integration tests.
//!
//! Unix tests drive `DockerRuntime` against small shell scripts standing in
//! for the `docker` CLI, so the whole path runs without a daemon: the script
//! reaches the container through the environment, the shell evaluates it, and
//! the query flows through stdin into the redirected output file.
//!
//! Tests against a real daemon run only when CHQ_DOCKER_TESTS is set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chq::client::Clickhouse;
use chq::config::{ConnectionConfig, RuntimeConfig};
use chq::error::ChqError;
use chq::image::ImageRef;
use chq::runtime::{ContainerRuntime, DockerRuntime};
use chq::secrets::{SecretRef, StaticSecretStore};
use tokio_util::sync::CancellationToken;

/// Writes an executable script to `dir/name` and returns its path.
#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runtime(program: &Path, work_dir: &Path) -> Arc<DockerRuntime> {
    Arc::new(DockerRuntime::new(&RuntimeConfig {
        program: program.to_string_lossy().into_owned(),
        work_dir: work_dir.to_path_buf(),
        run_args: Vec::new(),
    }))
}

/// Names of the query output files currently in `dir`.
fn output_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("out-") && name.ends_with(".csv"))
        .collect();
    names.sort();
    names
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new(
        "db.example.com",
        9000,
        "alice",
        SecretRef::Env("UNUSED".to_string()),
    )
    .unwrap()
}

/// Fake CLI whose `clickhouse` prints one argument per line, then stdin.
#[cfg(unix)]
const ECHO_ARGS_CLI: &str = r#"clickhouse() { for a in "$@"; do printf '%s\n' "$a"; done; cat; }
eval "$CHQ_SCRIPT""#;

#[cfg(unix)]
#[tokio::test]
async fn test_arguments_survive_the_shell_intact() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(dir.path(), "fake-docker", ECHO_ARGS_CLI);
    let marker = dir.path().join("pwned");
    let password = format!(
        "p@ss'word $(touch {}) `id`; echo \"x\"",
        marker.display()
    );

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new(password.as_str()),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let path = client
        .csv("SELECT 1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(path.parent(), Some(dir.path()));

    let output = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "client",
            "--host",
            "db.example.com",
            "--port",
            "9000",
            "--user",
            "alice",
            "--password",
            password.as_str(),
            "--secure",
            "--format",
            "CSV",
            "SELECT 1",
        ]
    );
    assert!(!marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_empty_query_gives_empty_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(dir.path(), "fake-docker", "cat");
    let rt = runtime(&program, dir.path());

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("pw"),
        rt,
    )
    .await
    .unwrap();

    let path = client.csv("", &CancellationToken::new()).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "");
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_zero_exit_is_redacted_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(
        dir.path(),
        "fake-docker",
        r#"printf 'Code: 516. Authentication failed while running: %s\n' "$CHQ_SCRIPT" >&2
exit 4"#,
    );

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("hunter2"),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let err = client
        .csv("SELECT 1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ChqError::Execution(_)));
    let msg = err.to_string();
    assert!(msg.contains("Authentication failed"), "{msg}");
    assert!(msg.contains("--password [REDACTED]"), "{msg}");
    assert!(!msg.contains("hunter2"), "{msg}");
    assert!(output_files(dir.path()).is_empty());

    // The instance stays usable after a failed run.
    let err = client
        .csv("SELECT 2", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChqError::Execution(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_runs_get_their_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(dir.path(), "fake-docker", "cat");

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("pw"),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let (a, b) = tokio::join!(client.csv("AAAA", &cancel), client.csv("BBBB", &cancel));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a, b);
    assert_eq!(std::fs::read_to_string(&a).unwrap(), "AAAA");
    assert_eq!(std::fs::read_to_string(&b).unwrap(), "BBBB");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_run_keeps_earlier_result() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(
        dir.path(),
        "fake-docker",
        r#"query=$(cat)
case "$query" in
  *bad*) echo 'Code: 62. Syntax error' >&2; exit 1 ;;
esac
printf '%s' "$query""#,
    );

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("pw"),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let first = client
        .csv("SELECT 1", &CancellationToken::new())
        .await
        .unwrap();
    let err = client
        .csv("SELECT bad", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChqError::Execution(_)));

    assert_eq!(std::fs::read_to_string(&first).unwrap(), "SELECT 1");
    assert_eq!(output_files(dir.path()).len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_existing_out_csv_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(dir.path(), "fake-docker", "cat");
    std::fs::write(dir.path().join("out.csv"), "keep me").unwrap();

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("pw"),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let path = client
        .csv("SELECT 1", &CancellationToken::new())
        .await
        .unwrap();
    assert_ne!(path, dir.path().join("out.csv"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.csv")).unwrap(),
        "keep me"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancellation_removes_the_container() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(
        dir.path(),
        "fake-docker",
        &format!(
            r#"case "$1" in
  rm) printf '%s\n' "$@" > "{log}/removed" ;;
  run) printf '%s\n' "$@" > "{log}/started"; exec sleep 30 ;;
  *) exit 1 ;;
esac"#,
            log = dir.path().display()
        ),
    );

    let client = Clickhouse::connect(
        config(),
        ImageRef::default(),
        &StaticSecretStore::new("pw"),
        runtime(&program, dir.path()),
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client.csv("SELECT 1", &cancel).await.unwrap_err();
    assert!(matches!(err, ChqError::Cancelled));
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    let run_args = std::fs::read_to_string(dir.path().join("started")).unwrap();
    let run_args: Vec<&str> = run_args.lines().collect();
    let name_at = run_args.iter().position(|a| *a == "--name").unwrap();
    let name = run_args[name_at + 1];
    assert!(name.starts_with("chq-out-"), "{name}");

    let removed = std::fs::read_to_string(dir.path().join("removed")).unwrap();
    assert_eq!(removed.lines().collect::<Vec<_>>(), vec!["rm", "--force", name]);
    assert!(output_files(dir.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_resolve_pin_reads_repo_digest() {
    let dir = tempfile::tempdir().unwrap();
    let digest = "cd".repeat(32);
    let program = write_script(
        dir.path(),
        "fake-docker",
        &format!(
            r#"case "$1" in
  pull) exit 0 ;;
  image) echo "clickhouse/clickhouse-server@sha256:{digest}" ;;
  *) exit 1 ;;
esac"#
        ),
    );

    let pin = runtime(&program, dir.path())
        .resolve_pin("clickhouse/clickhouse-server")
        .await
        .unwrap();
    assert_eq!(pin.name(), "clickhouse/clickhouse-server");
    assert_eq!(pin.digest(), format!("sha256:{digest}"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_resolve_pin_pull_failure() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_script(
        dir.path(),
        "fake-docker",
        "echo 'manifest unknown' >&2; exit 1",
    );

    let err = runtime(&program, dir.path())
        .resolve_pin("clickhouse/clickhouse-server:nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ChqError::Execution(_)));
    assert!(err.to_string().contains("manifest unknown"));
}

/// Runs the real image against a real daemon. Needs CHQ_DOCKER_TESTS.
#[tokio::test]
async fn test_real_docker_resolves_pin() {
    if std::env::var_os("CHQ_DOCKER_TESTS").is_none() {
        eprintln!("Skipping test: CHQ_DOCKER_TESTS not set");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let pin = runtime(Path::new("docker"), dir.path())
        .resolve_pin(chq::image::DEFAULT_REPOSITORY)
        .await
        .unwrap();
    assert!(pin.digest().starts_with("sha256:"));
}
