#![allow(deprecated)]
//! CLI contract: exit codes, stdio plumbing and the store round trip.

use assert_cmd::Command;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;
use std::io::Read;
use std::path::Path;

const PV_PATH: &str = "resources/persistentvolumes/cluster/pv1.json";

fn cmd(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("terminus-plugin").unwrap();
    cmd.env_remove("TERMINUS_CONFIG")
        .env_remove("TERMINUS_REWRITE_ARCHIVES")
        .env_remove("TERMINUS_NEWLINE_MODE")
        .env("TERMINUS_BACKUP_ROOT", root.join("store"))
        .env("TERMINUS_RESTORE_WORKSPACE", root.join("scratch"))
        .env("RUST_LOG", "warn");
    cmd
}

fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn member(archive: &[u8], path: &str) -> Vec<u8> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap().to_str() == Some(path) {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            return data;
        }
    }
    panic!("{path} not in archive");
}

#[test]
fn rewrite_stdin_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = archive(&[(PV_PATH, br#"{"volumeId": "abc"}"#), ("other/file.json", b"{}")]);

    let output = cmd(dir.path())
        .arg("rewrite")
        .write_stdin(input)
        .assert()
        .success()
        .stderr(predicate::str::contains("rewrote 1 file(s)"))
        .get_output()
        .stdout
        .clone();

    assert_eq!(member(&output, PV_PATH), b"{\"VolumeId\": \"abc\"}\n");
    assert_eq!(member(&output, "other/file.json"), b"{}");
}

#[test]
fn rewrite_files_preserving_newlines() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.tar.gz");
    let output_path = dir.path().join("out.tar.gz");
    std::fs::write(&input_path, archive(&[(PV_PATH, br#"{"volumeId": "abc"}"#)])).unwrap();

    cmd(dir.path())
        .args(["rewrite", "--preserve-newlines", "-i"])
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success();

    let output = std::fs::read(&output_path).unwrap();
    assert_eq!(member(&output, PV_PATH), br#"{"VolumeId": "abc"}"#);
}

#[test]
fn rewrite_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    cmd(dir.path())
        .arg("rewrite")
        .write_stdin("definitely not gzip")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a valid backup archive"));
}

#[test]
fn store_roundtrip_and_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("backup.json");
    std::fs::write(&src, b"{\"kind\":\"Backup\"}").unwrap();

    cmd(dir.path())
        .args(["store", "put", "-b", "velero", "backups/b1/velero-backup.json", "-f"])
        .arg(&src)
        .assert()
        .success();

    cmd(dir.path())
        .args(["store", "exists", "-b", "velero", "backups/b1/velero-backup.json"])
        .assert()
        .success()
        .stdout("true\n");

    cmd(dir.path())
        .args(["store", "get", "-b", "velero", "backups/b1/velero-backup.json"])
        .assert()
        .success()
        .stdout("{\"kind\":\"Backup\"}");

    cmd(dir.path())
        .args(["store", "prefixes", "-b", "velero"])
        .assert()
        .success()
        .stdout("backups/\n");

    cmd(dir.path())
        .args(["store", "ls", "-b", "velero", "-p", "backups/"])
        .assert()
        .success()
        .stdout("backups/b1/velero-backup.json\n");

    cmd(dir.path())
        .args(["store", "rm", "-b", "velero", "backups/b1"])
        .assert()
        .success();

    cmd(dir.path())
        .args(["store", "exists", "-b", "velero", "backups/b1/velero-backup.json"])
        .assert()
        .code(2)
        .stdout("false\n");

    cmd(dir.path())
        .args(["store", "get", "-b", "velero", "backups/b1/velero-backup.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("object not found"));
}

#[test]
fn store_get_converts_backup_archives() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("b1.tar.gz");
    std::fs::write(&src, archive(&[(PV_PATH, br#"{"volumeId": "abc"}"#)])).unwrap();

    cmd(dir.path())
        .args(["store", "put", "-b", "velero", "backups/b1/b1.tar.gz", "-f"])
        .arg(&src)
        .assert()
        .success();

    let converted = cmd(dir.path())
        .args(["store", "get", "-b", "velero", "backups/b1/b1.tar.gz"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(member(&converted, PV_PATH), b"{\"VolumeId\": \"abc\"}\n");

    let raw = cmd(dir.path())
        .args(["store", "get", "--no-rewrite", "-b", "velero", "backups/b1/b1.tar.gz"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(member(&raw, PV_PATH), br#"{"volumeId": "abc"}"#);
}

#[test]
fn store_url_expired() {
    let dir = tempfile::tempdir().unwrap();
    cmd(dir.path())
        .args(["store", "url", "-b", "velero", "backups/b1/b1.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with("velero/backups/b1/b1.tar.gz\n"));

    cmd(dir.path())
        .args(["store", "url", "-b", "velero", "backups/b1/b1.tar.gz", "--ttl-secs", "-1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("backup expired"));
}

#[test]
fn plugins_lists_registered_names() {
    let dir = tempfile::tempdir().unwrap();
    cmd(dir.path())
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("terminus.io/object-store\tObjectStore"))
        .stdout(predicate::str::contains("terminus.io/volume-snapshotter\tVolumeSnapshotter"))
        .stdout(predicate::str::contains("terminus.io/restore-item-action\tRestoreItemAction"));
}

#[test]
fn bad_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("plugin.yaml");
    std::fs::write(&cfg, "newline_mode: sideways\n").unwrap();
    cmd(dir.path())
        .arg("--config")
        .arg(&cfg)
        .arg("plugins")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load config"));
}
