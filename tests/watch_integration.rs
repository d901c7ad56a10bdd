//! Integration tests for a complete watch root.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use filewatcher::config::{WatchConfig, WatchesFile};
use filewatcher::error::{NotificationError, WatcherError};
use filewatcher::notifications::{Transport, TransportResponse};
use filewatcher::rules::{ActionConfig, ActionKind};
use filewatcher::watcher::{EventResult, Trigger, Watch, WatchBackend};
use filewatcher::Error;
use notify::event::{CreateKind, DataChange, EventKind, ModifyKind, RemoveKind};
use parking_lot::Mutex;
use reqwest::{Method, Url};
use tempfile::TempDir;
use tokio::runtime::Handle;

/// Backend whose events are injected by the test.
struct InjectedBackend;

impl WatchBackend for InjectedBackend {
    fn enable(&mut self, _root: &Path, _recursive: bool) -> Result<(), WatcherError> {
        Ok(())
    }

    fn disable(&mut self, _root: &Path) -> Result<(), WatcherError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTransport {
    bodies: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        _method: &Method,
        _url: &Url,
        _headers: &[(String, String)],
        body: String,
    ) -> Result<TransportResponse, NotificationError> {
        self.bodies.lock().push(body);
        Ok(TransportResponse {
            status: 200,
            body: String::new(),
        })
    }
}

fn event(kind: EventKind, path: &Path) -> EventResult {
    Ok(notify::Event::new(kind).add_path(path.to_path_buf()))
}

fn copy_to(backup: &Path, trigger: Trigger) -> ActionConfig {
    ActionConfig {
        kind: ActionKind::Copy,
        source: "[fullpath]".to_string(),
        destination: Some(format!("{}/[name]", backup.display())),
        triggers: trigger.as_set(),
        verify: true,
        keep_timestamps: false,
    }
}

struct Fixture {
    _tmp: TempDir,
    data: PathBuf,
    backup: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let backup = tmp.path().join("backup");
    std::fs::create_dir(&data).unwrap();
    std::fs::create_dir(&backup).unwrap();
    Fixture {
        _tmp: tmp,
        data,
        backup,
    }
}

#[tokio::test]
async fn test_copy_fires_once_per_logical_create() {
    let fx = fixture();
    let file = fx.data.join("file.txt");
    std::fs::write(&file, "hello").unwrap();

    let mut config = WatchConfig::new(&fx.data);
    config.actions.push(copy_to(&fx.backup, Trigger::Create));

    let (tx, rx) = crossbeam_channel::unbounded();
    let watch = Watch::start_with(&config, Handle::current(), InjectedBackend, rx, None).unwrap();

    // A single copy into the folder raises a create and two data changes.
    tx.send(event(EventKind::Create(CreateKind::File), &file)).unwrap();
    tx.send(event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &file))
        .unwrap();
    tx.send(event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &file))
        .unwrap();

    // Wait for the source thread to forward everything before stopping it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = watch.shutdown().await;

    assert_eq!(stats.received, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(
        std::fs::read_to_string(fx.backup.join("file.txt")).unwrap(),
        "hello"
    );
}

#[tokio::test]
async fn test_excluded_files_are_not_copied() {
    let fx = fixture();
    let keep = fx.data.join("keep.txt");
    let skip = fx.data.join("skip.tmp");
    std::fs::write(&keep, "k").unwrap();
    std::fs::write(&skip, "s").unwrap();

    let file: WatchesFile = format!(
        r#"
        [[watch]]
        path = "{data}"

        [watch.exclusions]
        files = ["*.tmp"]

        [[watch.actions]]
        type = "copy"
        destination = "{backup}/[name]"
        triggers = ["create"]
        "#,
        data = fx.data.display(),
        backup = fx.backup.display(),
    )
    .parse()
    .unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let watch =
        Watch::start_with(&file.watch[0], Handle::current(), InjectedBackend, rx, None).unwrap();

    tx.send(event(EventKind::Create(CreateKind::File), &keep)).unwrap();
    tx.send(event(EventKind::Create(CreateKind::File), &skip)).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = watch.shutdown().await;

    assert_eq!(stats.excluded, 1);
    assert_eq!(stats.processed, 1);
    assert!(fx.backup.join("keep.txt").exists());
    assert!(!fx.backup.join("skip.tmp").exists());
}

#[tokio::test]
async fn test_notifications_flushed_on_shutdown() {
    let fx = fixture();
    let file = fx.data.join("report.csv");
    std::fs::write(&file, "a,b").unwrap();

    let watches: WatchesFile = format!(
        r#"
        [[watch]]
        path = "{data}"

        [[watch.notifications.destination]]
        url = "https://hooks.example.com/files"
        triggers = ["create", "delete"]
        body = '{{"text":"[message]"}}'
        "#,
        data = fx.data.display(),
    )
    .parse()
    .unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let (tx, rx) = crossbeam_channel::unbounded();
    let watch = Watch::start_with(
        &watches.watch[0],
        Handle::current(),
        InjectedBackend,
        rx,
        Some(transport.clone() as Arc<dyn Transport>),
    )
    .unwrap();

    tx.send(event(EventKind::Create(CreateKind::File), &file)).unwrap();
    tx.send(event(EventKind::Modify(ModifyKind::Data(DataChange::Any)), &file))
        .unwrap();
    tx.send(event(EventKind::Remove(RemoveKind::File), &file)).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    watch.shutdown().await;

    let bodies = transport.bodies.lock();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        format!(
            r#"{{"text":"Created: {path}\nDeleted: {path}\n"}}"#,
            path = file.display()
        )
    );
}

#[tokio::test]
async fn test_missing_root_reports_path_not_found() {
    let fx = fixture();
    let mut config = WatchConfig::new(fx.data.join("not-there"));
    config.path_timeout_secs = 1;

    let (_tx, rx) = crossbeam_channel::unbounded();
    let started = std::time::Instant::now();
    let err = tokio::task::spawn_blocking(move || {
        Watch::start_with(&config, Handle::current(), InjectedBackend, rx, None)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(matches!(
        err,
        Error::Watcher(WatcherError::PathNotFound { waited_secs: 1, .. })
    ));
}
