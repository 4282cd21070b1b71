use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use woda_bridge::{Capability, EventEmitter, EventMessage, Outbound, Value, WorkerPool};
use woda_common::CapabilityError;

use super::launcher::Launcher;
use super::listing::{DirEntry, LOADING_NAME};
use super::sandbox::Sandbox;
use super::{FileSystemCapability, MEMBERS, OBJECT_ID};

#[derive(Default)]
struct RecordingLauncher {
    opened: Mutex<Vec<PathBuf>>,
}

impl Launcher for RecordingLauncher {
    fn open(&self, path: &Path) -> Result<(), CapabilityError> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    fs: FileSystemCapability,
    launcher: Arc<RecordingLauncher>,
    events: EventEmitter,
    rx: UnboundedReceiver<Outbound>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(RecordingLauncher::default());
        let fs = FileSystemCapability::with_launcher(
            Sandbox::new(dir.path()).unwrap(),
            WorkerPool::new(2),
            launcher.clone(),
        );
        let (events, rx) = EventEmitter::standalone(OBJECT_ID, MEMBERS);
        Self {
            dir,
            fs,
            launcher,
            events,
            rx,
        }
    }

    fn base(&self) -> &Path {
        self.fs.sandbox().root()
    }

    fn next_event(&mut self) -> EventMessage {
        match self.rx.try_recv() {
            Ok(Outbound::Event(event)) => event,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    async fn wait_event(&mut self) -> EventMessage {
        let frame = tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event queue closed");
        match frame {
            Outbound::Event(event) => event,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    fn assert_quiet(&mut self) {
        assert!(self.rx.try_recv().is_err(), "unexpected extra event");
    }
}

fn error_message(event: &EventMessage) -> &str {
    assert_eq!(event.member, "errorOccurred");
    event.payload.as_str().unwrap()
}

fn entries(listing: &str) -> Vec<DirEntry> {
    serde_json::from_str(listing).unwrap()
}

#[tokio::test]
async fn create_then_read_round_trips_content() {
    let mut f = Fixture::new();
    f.fs.create_file("notes/a.txt", "hello", &f.events).await;

    let created = f.next_event();
    assert_eq!(created.member, "fileCreated");
    assert_eq!(created.payload, json!("notes/a.txt"));
    assert_eq!(
        std::fs::read_to_string(f.base().join("notes/a.txt")).unwrap(),
        "hello"
    );

    f.fs.read_file("notes/a.txt", &f.events).await;
    let read = f.next_event();
    assert_eq!(read.member, "fileRead");
    assert_eq!(read.payload, json!(["notes/a.txt", "hello"]));
}

#[tokio::test]
async fn leading_separator_resolves_under_base() {
    let mut f = Fixture::new();
    f.fs.create_file("/etc/passwd", "not really", &f.events).await;
    assert_eq!(f.next_event().member, "fileCreated");
    assert!(f.base().join("etc/passwd").is_file());
}

#[tokio::test]
async fn traversal_is_rejected_not_clamped() {
    let mut f = Fixture::new();
    f.fs.create_file("../escaped.txt", "x", &f.events).await;

    let event = f.next_event();
    assert_eq!(
        error_message(&event),
        "Error creating file ../escaped.txt: path escapes sandbox: ../escaped.txt"
    );
    assert!(!f.dir.path().parent().unwrap().join("escaped.txt").exists());
}

#[tokio::test]
async fn reading_a_missing_file_reports_error() {
    let mut f = Fixture::new();
    f.fs.read_file("missing.txt", &f.events).await;
    let event = f.next_event();
    assert!(error_message(&event).starts_with("Error reading file missing.txt: "));
    f.assert_quiet();
}

#[tokio::test]
async fn change_file_content_needs_existing_parent() {
    let mut f = Fixture::new();
    std::fs::write(f.base().join("a.txt"), "old").unwrap();

    f.fs.change_file_content("a.txt", "new", &f.events).await;
    assert_eq!(f.next_event().member, "fileChanged");
    assert_eq!(std::fs::read_to_string(f.base().join("a.txt")).unwrap(), "new");

    f.fs.change_file_content("nope/a.txt", "new", &f.events).await;
    let event = f.next_event();
    assert!(error_message(&event).starts_with("Error changing file content nope/a.txt: "));
    assert!(!f.base().join("nope").exists());
}

#[tokio::test]
async fn delete_file_and_refuse_directories() {
    let mut f = Fixture::new();
    std::fs::write(f.base().join("a.txt"), "x").unwrap();
    std::fs::create_dir(f.base().join("d")).unwrap();

    f.fs.delete_file("a.txt", &f.events).await;
    assert_eq!(f.next_event().member, "fileDeleted");
    assert!(!f.base().join("a.txt").exists());

    f.fs.delete_file("d", &f.events).await;
    assert_eq!(error_message(&f.next_event()), "Error deleting file d: not a file: d");
    assert!(f.base().join("d").is_dir());
}

#[tokio::test]
async fn create_directory_is_recursive() {
    let mut f = Fixture::new();
    f.fs.create_directory("a/b/c", &f.events).await;
    let event = f.next_event();
    assert_eq!(event.member, "directoryCreated");
    assert_eq!(event.payload, json!("a/b/c"));
    assert!(f.base().join("a/b/c").is_dir());
}

#[tokio::test]
async fn deleting_non_empty_directory_removes_nothing() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("full")).unwrap();
    std::fs::write(f.base().join("full/keep.txt"), "x").unwrap();

    f.fs.delete_directory("full", &f.events).await;
    let event = f.next_event();
    assert!(error_message(&event).starts_with("Error deleting directory full: "));
    assert!(f.base().join("full/keep.txt").is_file());

    std::fs::create_dir(f.base().join("empty")).unwrap();
    f.fs.delete_directory("empty", &f.events).await;
    assert_eq!(f.next_event().member, "directoryDeleted");
    assert!(!f.base().join("empty").exists());
}

#[tokio::test]
async fn base_directory_cannot_be_deleted() {
    let mut f = Fixture::new();
    f.fs.delete_directory("/", &f.events).await;
    assert_eq!(f.next_event().member, "errorOccurred");
    assert!(f.base().is_dir());
}

#[tokio::test]
async fn list_directory_emits_sorted_listing() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("docs")).unwrap();
    std::fs::write(f.base().join("docs/b.txt"), "").unwrap();
    std::fs::write(f.base().join("docs/a.txt"), "").unwrap();

    f.fs.list_directory("docs", &f.events).await;
    let event = f.next_event();
    assert_eq!(event.member, "directoryListed");
    assert_eq!(event.payload[0], json!("docs"));
    let listed = entries(event.payload[1].as_str().unwrap());
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "a.txt");
    assert_eq!(listed[0].path, "docs/a.txt");
    assert_eq!(
        f.fs.cache().get("docs").as_deref(),
        event.payload[1].as_str()
    );
}

#[tokio::test]
async fn list_directory_replaces_stale_cache_entry() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("docs")).unwrap();
    std::fs::write(f.base().join("docs/a.txt"), "").unwrap();

    f.fs.get_directory_contents("docs", &f.events).await.unwrap();
    f.next_event();

    std::fs::write(f.base().join("docs/b.txt"), "").unwrap();
    f.fs.list_directory("docs", &f.events).await;
    f.next_event();

    let cached = f.fs.get_cached_directory_contents("docs", &f.events);
    assert_eq!(entries(&cached).len(), 2);
    f.assert_quiet();
}

#[tokio::test]
async fn repeated_polls_on_a_miss_start_one_refresh() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("pics")).unwrap();
    std::fs::write(f.base().join("pics/cat.png"), "").unwrap();

    for _ in 0..5 {
        let polled = f.fs.get_cached_directory_contents("pics", &f.events);
        assert_eq!(entries(&polled)[0].name, LOADING_NAME);
    }
    f.fs.wait_refreshes().await;

    assert_eq!(f.next_event().member, "directoryListed");
    f.assert_quiet();
    assert_eq!(f.fs.cache().refreshing(), 0);
    assert_eq!(
        entries(&f.fs.get_cached_directory_contents("pics", &f.events))[0].name,
        "cat.png"
    );
}

#[tokio::test]
async fn failed_refresh_releases_its_claim() {
    let mut f = Fixture::new();
    f.fs.get_cached_directory_contents("ghost", &f.events);
    f.fs.wait_refreshes().await;
    assert_eq!(f.next_event().member, "errorOccurred");
    assert_eq!(f.fs.cache().refreshing(), 0);

    f.fs.get_cached_directory_contents("ghost", &f.events);
    f.fs.wait_refreshes().await;
    assert_eq!(f.next_event().member, "errorOccurred");
}

#[tokio::test]
async fn cached_listing_matches_direct_listing_without_touching_disk() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("docs")).unwrap();
    std::fs::write(f.base().join("docs/a.txt"), "").unwrap();

    let direct = f.fs.get_directory_contents("docs", &f.events).await.unwrap();
    assert_eq!(f.next_event().member, "directoryListed");

    std::fs::remove_dir_all(f.base().join("docs")).unwrap();
    let cached = f.fs.get_cached_directory_contents("docs", &f.events);
    assert_eq!(cached, direct);
    f.assert_quiet();
}

#[tokio::test]
async fn cache_miss_returns_placeholder_then_refreshes() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("pics")).unwrap();
    std::fs::write(f.base().join("pics/cat.png"), "").unwrap();

    let first = f.fs.get_cached_directory_contents("pics", &f.events);
    let placeholder = entries(&first);
    assert_eq!(placeholder.len(), 1);
    assert_eq!(placeholder[0].name, LOADING_NAME);

    let event = f.wait_event().await;
    assert_eq!(event.member, "directoryListed");

    let second = f.fs.get_cached_directory_contents("pics", &f.events);
    assert_eq!(entries(&second)[0].name, "cat.png");
}

#[tokio::test]
async fn listing_a_missing_directory_reports_and_returns_error() {
    let mut f = Fixture::new();
    let err = f.fs.get_directory_contents("ghost", &f.events).await.unwrap_err();
    assert!(matches!(err, CapabilityError::DirectoryNotFound(_)));
    assert_eq!(
        error_message(&f.next_event()),
        "Error listing directory ghost: directory not found: ghost"
    );
    assert!(f.fs.cache().get("ghost").is_none());
}

#[tokio::test]
async fn concurrent_listings_do_not_cross_contaminate() {
    let mut f = Fixture::new();
    for (dir, file) in [("left", "l.txt"), ("right", "r.txt")] {
        std::fs::create_dir(f.base().join(dir)).unwrap();
        std::fs::write(f.base().join(dir).join(file), "").unwrap();
    }

    let (left, right) = tokio::join!(
        f.fs.get_directory_contents("left", &f.events),
        f.fs.get_directory_contents("right", &f.events),
    );
    let (left, right) = (entries(&left.unwrap()), entries(&right.unwrap()));
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].path, "left/l.txt");
    assert_eq!(right.len(), 1);
    assert_eq!(right[0].path, "right/r.txt");

    std::fs::write(f.base().join("left/l2.txt"), "").unwrap();
    tokio::join!(
        f.fs.list_directory("left", &f.events),
        f.fs.list_directory("right", &f.events),
    );
    let mut listed = Vec::new();
    while let Ok(Outbound::Event(event)) = f.rx.try_recv() {
        if event.member == "directoryListed" {
            listed.push(event);
        }
    }
    assert_eq!(listed.len(), 4);
    for event in &listed {
        let dir = event.payload[0].as_str().unwrap();
        for entry in entries(event.payload[1].as_str().unwrap()) {
            assert!(entry.path.starts_with(&format!("{dir}/")), "{entry:?} in {dir}");
        }
    }

    let left = entries(&f.fs.cache().get("left").unwrap());
    assert_eq!(left.len(), 2);
    assert!(left.iter().all(|e| e.path.starts_with("left/")));
    let right = entries(&f.fs.cache().get("right").unwrap());
    assert_eq!(right.len(), 1);
    assert_eq!(right[0].name, "r.txt");
}

#[tokio::test]
async fn open_file_hands_off_to_launcher() {
    let mut f = Fixture::new();
    std::fs::write(f.base().join("report.pdf"), "%PDF").unwrap();

    f.fs.open_file("report.pdf", &f.events).await;
    let event = f.next_event();
    assert_eq!(event.member, "fileOpened");
    assert_eq!(event.payload, json!("report.pdf"));
    assert_eq!(
        *f.launcher.opened.lock().unwrap(),
        vec![f.base().join("report.pdf")]
    );
}

#[tokio::test]
async fn open_file_validates_path() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("dir")).unwrap();

    f.fs.open_file("", &f.events).await;
    assert_eq!(error_message(&f.next_event()), "Error opening file : empty path");

    f.fs.open_file("missing.pdf", &f.events).await;
    assert_eq!(
        error_message(&f.next_event()),
        "Error opening file missing.pdf: file not found: missing.pdf"
    );

    f.fs.open_file("dir", &f.events).await;
    assert_eq!(
        error_message(&f.next_event()),
        "Error opening file dir: is a directory: dir"
    );
    assert!(f.launcher.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn save_dropped_data_uri() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("uploads")).unwrap();

    let saved = f
        .fs
        .save_dropped_file(
            "uploads",
            "x.bin",
            "data:application/octet-stream;base64,SGVsbG8=",
            &f.events,
        )
        .await;
    assert!(saved);
    assert_eq!(std::fs::read(f.base().join("uploads/x.bin")).unwrap(), b"Hello");
    let event = f.next_event();
    assert_eq!(event.member, "fileCreated");
    assert_eq!(event.payload, json!("uploads/x.bin"));
}

#[tokio::test]
async fn save_dropped_raw_base64_and_text() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("in")).unwrap();

    assert!(f.fs.save_dropped_file("in", "b64.bin", "SGVsbG8=", &f.events).await);
    assert_eq!(std::fs::read(f.base().join("in/b64.bin")).unwrap(), b"Hello");

    assert!(f.fs.save_dropped_file("/in/", "note.txt", "plain text!", &f.events).await);
    assert_eq!(std::fs::read_to_string(f.base().join("in/note.txt")).unwrap(), "plain text!");
}

#[tokio::test]
async fn save_dropped_empty_file() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("in")).unwrap();
    assert!(f.fs.save_dropped_file("in", "empty.txt", "data:", &f.events).await);
    assert_eq!(std::fs::read(f.base().join("in/empty.txt")).unwrap(), b"");
    assert_eq!(f.next_event().member, "fileCreated");
}

#[tokio::test]
async fn save_dropped_needs_existing_directory() {
    let mut f = Fixture::new();
    let saved = f.fs.save_dropped_file("nowhere", "x.bin", "SGVsbG8=", &f.events).await;
    assert!(!saved);
    assert_eq!(
        error_message(&f.next_event()),
        "Error saving dropped file nowhere/x.bin: directory not found: nowhere"
    );
    assert!(!f.base().join("nowhere").exists());
}

#[tokio::test]
async fn save_dropped_rejects_path_in_file_name() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("in")).unwrap();
    assert!(!f.fs.save_dropped_file("in", "../x.bin", "SGVsbG8=", &f.events).await);
    assert_eq!(f.next_event().member, "errorOccurred");
    assert!(!f.base().join("x.bin").exists());
}

#[tokio::test]
async fn invoke_routes_members_and_results() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.base().join("docs")).unwrap();

    let result = f
        .fs
        .invoke("createFile", vec![json!("docs/a.txt"), json!("hi")], &f.events)
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
    assert_eq!(f.next_event().member, "fileCreated");

    let listing = f
        .fs
        .invoke("getDirectoryContents", vec![json!("docs")], &f.events)
        .await
        .unwrap();
    assert_eq!(entries(listing.as_str().unwrap())[0].name, "a.txt");

    let err = f
        .fs
        .invoke("readFile", vec![json!(42)], &f.events)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: path must be a string");
}
