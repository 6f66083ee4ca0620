//! End-to-end update runs against a local HTTP folder and a plain directory.

mod common;

use std::fs;
use std::sync::Arc;

use apphub_core::catalog::{Catalog, ManagedApplication};
use apphub_core::config::{RetryConfig, StoreConfig};
use apphub_core::error::ErrorKind;
use apphub_core::fetcher::{store_from_config, LocalFolderStore};
use apphub_core::manifest::PackageKind;
use apphub_core::orchestrator::{BatchControl, EventSink, PipelineState, ProgressEvent, UpdateOutcome};
use apphub_core::shell::{spawn_check_and_update, DEFAULT_EVENT_CAPACITY};
use common::folder_server::FolderServer;
use common::{manifest_json, sha256_hex, zip_bytes, Sandbox};
use tokio::sync::mpsc;

fn http_config(sandbox: &Sandbox, server: &FolderServer) -> apphub_core::config::UpdaterConfig {
    let mut cfg = sandbox.config(StoreConfig::Http {
        base_url: server.base_url().to_string(),
        folder: "apps".to_string(),
    });
    cfg.retry = Some(RetryConfig {
        max_attempts: 1,
        base_delay_secs: 0.0,
        max_delay_secs: 0,
    });
    cfg
}

#[tokio::test]
async fn update_over_http_installs_and_records_new_version() {
    let sandbox = Sandbox::new();
    let package = zip_bytes(&[("x/run.sh", b"#!/bin/sh\necho x\n"), ("x/readme.txt", b"1.0.1")]);
    let manifest = manifest_json(&[("x", "1.0.1", "x_1.0.1.pkg", &sha256_hex(&package))]);
    let server = FolderServer::start(vec![
        ("/apps/app_version.json".to_string(), manifest.into_bytes()),
        ("/apps/x_1.0.1.pkg".to_string(), package),
    ]);
    let cfg = http_config(&sandbox, &server);
    let store = store_from_config(&cfg).unwrap();
    let updater = sandbox.updater(
        cfg.clone(),
        store,
        vec![
            ManagedApplication::new("x", "X", "1.0.0"),
            ManagedApplication::new("y", "Y", "3.0.0"),
        ],
    );

    let mut states = Vec::new();
    let summary = spawn_check_and_update(updater, Vec::new(), DEFAULT_EVENT_CAPACITY)
        .drain(|event| {
            if let ProgressEvent::State { state, .. } = event {
                states.push(state);
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.outcome_of("x"), Some(UpdateOutcome::Updated("1.0.1".into())));
    assert_eq!(summary.outcome_of("y"), Some(UpdateOutcome::UpToDate));
    assert_eq!(summary.counts(), (1, 0, 1));
    assert_eq!(states.last(), Some(&PipelineState::Done { ok: true }));

    // Read back from disk, not from the in-memory copy.
    let catalog = Catalog::load(&cfg.catalog_path).unwrap();
    let x = catalog.get("x").unwrap();
    assert_eq!(x.version, "1.0.1");
    let local = x.local_path.unwrap();
    assert_eq!(local, cfg.apps_dir.join("x").join("1.0.1"));
    assert_eq!(fs::read(local.join("x").join("readme.txt")).unwrap(), b"1.0.1");
    assert_eq!(catalog.get("y").unwrap().version, "3.0.0");

    // The launcher reads the installed path from `local_exe`.
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cfg.catalog_path).unwrap()).unwrap();
    let recorded = raw["apps"][0].as_object().unwrap();
    assert_eq!(recorded["local_exe"], local.to_string_lossy().as_ref());
    assert!(!recorded.contains_key("local_path"));
    assert!(!recorded.contains_key("package_kind"));

    let cached: Vec<_> = fs::read_dir(&cfg.cache_dir).unwrap().collect();
    assert!(cached.is_empty(), "cache should be empty, found {cached:?}");
    assert!(server.requests().iter().any(|r| r == "/apps/x_1.0.1.pkg"));
}

#[tokio::test]
async fn missing_package_fails_not_found_and_keeps_catalog() {
    let sandbox = Sandbox::new();
    let manifest = manifest_json(&[("x", "1.0.1", "x_1.0.1.pkg", &"ab".repeat(32))]);
    let server = FolderServer::start(vec![
        ("/apps/app_version.json".to_string(), manifest.into_bytes()),
        ("/apps/X_1.0.1.pkg".to_string(), b"wrong case".to_vec()),
    ]);
    let cfg = http_config(&sandbox, &server);
    let store = store_from_config(&cfg).unwrap();
    let updater = sandbox.updater(cfg.clone(), store, vec![ManagedApplication::new("x", "X", "1.0.0")]);

    let summary = spawn_check_and_update(updater, Vec::new(), DEFAULT_EVENT_CAPACITY)
        .finish()
        .await
        .unwrap();

    let Some(UpdateOutcome::Failed(failure)) = summary.outcome_of("x") else {
        panic!("expected failure, got {summary:?}");
    };
    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert!(failure.message.contains("x_1.0.1.pkg"));
    let catalog = Catalog::load(&cfg.catalog_path).unwrap();
    assert_eq!(catalog.get("x").unwrap().version, "1.0.0");
    assert!(!cfg.apps_dir.join("x").exists());
}

#[tokio::test]
async fn failing_app_does_not_affect_its_neighbours() {
    let sandbox = Sandbox::new();
    let mut entries = Vec::new();
    let mut packages = Vec::new();
    for id in ["a", "b", "c"] {
        let body = zip_bytes(&[("app.txt", id.as_bytes())]);
        let filename = format!("{id}_2.0.0.zip");
        fs::write(sandbox.remote().join(&filename), &body).unwrap();
        let hash = if id == "b" {
            sha256_hex(b"something else")
        } else {
            sha256_hex(&body)
        };
        packages.push((id, filename, hash));
    }
    for (id, filename, hash) in &packages {
        entries.push((*id, "2.0.0", filename.as_str(), hash.as_str()));
    }
    fs::write(
        sandbox.remote().join("app_version.json"),
        manifest_json(&entries),
    )
    .unwrap();

    let mut cfg = sandbox.local_config();
    cfg.max_concurrent_updates = 3;
    let store = Arc::new(LocalFolderStore::new(&sandbox.remote()));
    let updater = sandbox.updater(
        cfg.clone(),
        store,
        ["a", "b", "c"]
            .iter()
            .map(|id| ManagedApplication::new(*id, id.to_uppercase(), "1.0.0"))
            .collect(),
    );
    let report = updater.check().unwrap();
    assert_eq!(report.candidates.len(), 3);

    let (tx, mut rx) = mpsc::channel(256);
    let summary = Arc::clone(&updater)
        .run_batch(report.candidates, EventSink::new(tx), Arc::new(BatchControl::new()))
        .await;

    assert_eq!(summary.counts(), (2, 1, 0));
    assert_eq!(summary.failed[0].app_id, "b");
    assert_eq!(summary.failed[0].failure.kind, ErrorKind::HashMismatch);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    for id in ["a", "c"] {
        let seen: Vec<PipelineState> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::State { app_id, state, .. } if app_id == id => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                PipelineState::Checking,
                PipelineState::Downloading,
                PipelineState::Verifying,
                PipelineState::Installing,
                PipelineState::Recording,
                PipelineState::Done { ok: true },
            ],
            "state order for {id}"
        );
    }
    let catalog = Catalog::load(&cfg.catalog_path).unwrap();
    assert_eq!(catalog.get("a").unwrap().version, "2.0.0");
    assert_eq!(catalog.get("b").unwrap().version, "1.0.0");
    assert_eq!(catalog.get("c").unwrap().version, "2.0.0");
}

#[test]
fn reinstalling_the_same_package_leaves_one_install() {
    let sandbox = Sandbox::new();
    let pkg = sandbox.remote().join("x_1.0.1.zip");
    fs::write(&pkg, zip_bytes(&[("bin/x", b"x"), ("lib/a", b"a")])).unwrap();
    let cfg = sandbox.local_config();
    let updater = sandbox.updater(
        cfg.clone(),
        Arc::new(LocalFolderStore::new(&sandbox.remote())),
        vec![ManagedApplication::new("x", "X", "1.0.0")],
    );
    let installer = updater.installer();

    let first = installer.install(&pkg, PackageKind::Archive, "x", "1.0.1").unwrap();
    let second = installer.install(&pkg, PackageKind::Archive, "x", "1.0.1").unwrap();
    assert_eq!(first, second);

    let app_dir: Vec<_> = fs::read_dir(cfg.apps_dir.join("x"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(app_dir, vec!["1.0.1"]);
    let mut files: Vec<_> = fs::read_dir(&second)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["bin", "lib"]);
}
