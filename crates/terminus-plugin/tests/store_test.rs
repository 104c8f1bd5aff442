//! Object store integration tests: a backup lifecycle against a temporary
//! root, including archive conversion on download.

use std::io::Read;

use bytes::Bytes;
use chrono::TimeDelta;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use terminus_plugin::config::{ConfigMap, PluginConfig};
use terminus_plugin::registry::{Plugin, PluginRegistry, OBJECT_STORE_PLUGIN};
use terminus_plugin::store::{LocalObjectStore, ObjectStore};

const PV_PATH: &str = "resources/persistentvolumes/cluster/pv1.json";

fn backup_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in [
        (PV_PATH, &br#"{"spec":{"csi":{"volumeId":"abc"}}}"#[..]),
        ("resources/pods/namespaces/os/p.json", &br#"{"volumeId":"x"}"#[..]),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn read_member(archive: &[u8], path: &str) -> Vec<u8> {
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

fn config(dir: &tempfile::TempDir, rewrite: bool) -> PluginConfig {
    PluginConfig {
        root: dir.path().join("backups"),
        workspace: dir.path().join("scratch"),
        rewrite_backup_archives: rewrite,
        ..PluginConfig::default()
    }
}

#[tokio::test]
async fn test_backup_archive_converted_on_download() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir, true);
    let mut store = LocalObjectStore::from_config(&cfg).unwrap();

    let mut init = ConfigMap::new();
    init.insert("bucket".to_string(), "velero".to_string());
    store.init(&init).await.unwrap();

    let archive = backup_archive();
    store
        .put_object("velero", "backups/daily/daily.tar.gz", Bytes::from(archive.clone()))
        .await
        .unwrap();
    store
        .put_object("velero", "backups/daily/daily-logs.gz", Bytes::from(archive.clone()))
        .await
        .unwrap();

    // Stored bytes stay as uploaded.
    let on_disk = std::fs::read(cfg.root.join("velero/backups/daily/daily.tar.gz")).unwrap();
    assert_eq!(on_disk, archive);

    let downloaded = store
        .get_object("velero", "backups/daily/daily.tar.gz")
        .await
        .unwrap();
    assert_eq!(
        read_member(&downloaded, PV_PATH),
        b"{\"spec\":{\"csi\":{\"VolumeId\":\"abc\"}}}\n"
    );
    assert_eq!(
        read_member(&downloaded, "resources/pods/namespaces/os/p.json"),
        br#"{"volumeId":"x"}"#
    );

    let logs = store
        .get_object("velero", "backups/daily/daily-logs.gz")
        .await
        .unwrap();
    assert_eq!(logs.as_ref(), archive.as_slice(), "only content archives are converted");

    let scratch: Vec<_> = std::fs::read_dir(&cfg.workspace).unwrap().collect();
    assert!(scratch.is_empty(), "scratch directories left behind");
}

#[tokio::test]
async fn test_corrupt_backup_archive_fails_download() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::from_config(&config(&dir, true)).unwrap();
    store
        .put_object("velero", "backups/b/b.tar.gz", Bytes::from_static(b"garbage"))
        .await
        .unwrap();

    let err = store.get_object("velero", "backups/b/b.tar.gz").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("backups/b/b.tar.gz"), "got: {err}");
}

#[tokio::test]
async fn test_rewrite_disabled_returns_stored_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::from_config(&config(&dir, false)).unwrap();
    let archive = backup_archive();
    store
        .put_object("velero", "backups/daily/daily.tar.gz", Bytes::from(archive.clone()))
        .await
        .unwrap();

    let downloaded = store
        .get_object("velero", "backups/daily/daily.tar.gz")
        .await
        .unwrap();
    assert_eq!(downloaded.as_ref(), archive.as_slice());
}

#[tokio::test]
async fn test_backup_lifecycle_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PluginRegistry::with_defaults();
    let Plugin::ObjectStore(store) = registry.create(OBJECT_STORE_PLUGIN, &config(&dir, true)).unwrap()
    else {
        panic!("object store plugin built the wrong kind");
    };

    for name in ["b1", "b2"] {
        store
            .put_object(
                "velero",
                &format!("backups/{name}/velero-backup.json"),
                Bytes::from_static(b"{}"),
            )
            .await
            .unwrap();
    }

    let prefixes = store
        .list_common_prefixes("velero", "backups/", "/")
        .await
        .unwrap();
    assert_eq!(prefixes, vec!["backups/b1/", "backups/b2/"]);

    store.delete_object("velero", "backups/b1").await.unwrap();
    let remaining = store.list_objects("velero", "backups/").await.unwrap();
    assert_eq!(remaining, vec!["backups/b2/velero-backup.json"]);

    let url = store
        .create_signed_url("velero", "backups/b2/velero-backup.json", TimeDelta::hours(1))
        .await
        .unwrap();
    assert!(std::path::Path::new(&url).is_file());
}
