use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn cfdbox(args: &[&str], config_dir: &TempDir) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cfdbox"))
        .args(["--config"])
        .arg(config_dir.path().join("config.yml"))
        .args(args)
        .env_remove("SFTP_SERVER")
        .env_remove("SFTP_USER")
        .env_remove("SFTP_PASSWORD")
        .env_remove("SFTP_PORT")
        .output()
        .expect("Failed to run cfdbox")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_list_commands() {
    let config_dir = TempDir::new().unwrap();
    let output = cfdbox(&["list"], &config_dir);

    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("- export-cgns"));
    assert!(stdout.contains("- list"));
}

#[test]
fn test_bad_timesteps_reports_error() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("job.res");
    fs::write(&res, b"res").unwrap();
    fs::create_dir(dir.path().join("job")).unwrap();

    let output = cfdbox(
        &["export-cgns", "-t", "abc-10", res.to_str().unwrap()],
        &dir,
    );

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    let last = err.lines().last().unwrap_or_default();
    assert!(last.starts_with("error: timesteps must be in standard format"), "{}", err);
}

#[test]
fn test_sftp_export_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let output = cfdbox(
        &["export-cgns", "--sftp-export", "-t", "1", "/nowhere/job.res"],
        &dir,
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: uploading exports over sftp is not supported yet"));
}

#[test]
fn test_sftp_without_credentials_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let output = cfdbox(
        &["export-cgns", "--sftp-res", "-t", "1", "/nas/job.res"],
        &dir,
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("sftp support is not available"));
}

#[test]
fn test_missing_res_file() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("missing.res");
    fs::create_dir(dir.path().join("missing")).unwrap();
    fs::write(dir.path().join("missing").join("1.trn"), b"trn").unwrap();

    let output = cfdbox(&["export-cgns", "-t", "1", res.to_str().unwrap()], &dir);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("is not valid locally"));
}

#[test]
fn test_missing_res_reported_before_bad_timesteps() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("missing.res");

    let output = cfdbox(&["export-cgns", "-t", "abc-10", res.to_str().unwrap()], &dir);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("missing.res is not valid locally"), "{}", err);
    assert!(!err.contains("standard format"), "{}", err);
}

#[test]
fn test_reversed_range_selects_nothing() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("job.res");
    fs::write(&res, b"res").unwrap();
    fs::create_dir(dir.path().join("job")).unwrap();

    let output = cfdbox(&["export-cgns", "-t", "5-1", res.to_str().unwrap()], &dir);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: no timesteps selected"));
}

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();

    let output = cfdbox(&["config", "init"], &dir);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("config.yml").exists());

    // refuses to overwrite without --force
    let output = cfdbox(&["config", "init"], &dir);
    assert_eq!(output.status.code(), Some(1));

    let output = cfdbox(&["config", "show"], &dir);
    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cfx5export"));
    assert!(stdout.contains("sftp support is not available"));
}
