use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use storage::{ContentFingerprint, EntryKind, LocalStorage, Storage, StorageEntry};
use tempfile::{tempdir, TempDir};

use crate::consumer::{ConsumerManager, MemoryConsumer};
use crate::sync::{
    compare, next_sleep, plan, sync, Action, Disposition, Scheduler, SchedulerState, SyncConfig,
    SyncError, SyncEvent,
};

struct Fixture {
    _root: TempDir,
    source: PathBuf,
    replica: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempdir().unwrap();
        let source = root.path().join("source");
        let replica = root.path().join("replica");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&replica).unwrap();
        Self {
            _root: root,
            source,
            replica,
        }
    }

    fn config(&self) -> SyncConfig {
        SyncConfig::new(
            self.source.to_str().unwrap(),
            self.replica.to_str().unwrap(),
            1.0,
            "sync.log",
        )
        .unwrap()
    }

    async fn pass_with(&self, storage: &dyn Storage) -> (Result<crate::sync::PassReport, SyncError>, Vec<SyncEvent>) {
        let memory = MemoryConsumer::new();
        let mut consumers = ConsumerManager::new();
        consumers.add_consumer(Box::new(memory.clone()));

        let result = sync(&self.config(), storage, &mut consumers).await;
        (result, memory.events())
    }

    async fn pass(&self) -> Vec<SyncEvent> {
        let (result, events) = self.pass_with(&LocalStorage::default()).await;
        result.unwrap();
        events
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// relative path -> content (None for directories)
fn tree(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Option<Vec<u8>>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(relative, None);
                walk(root, &path, out);
            } else {
                out.insert(relative, Some(fs::read(&path).unwrap()));
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn summary(events: &[SyncEvent]) -> Vec<(Action, String)> {
    events
        .iter()
        .map(|e| (e.action, e.relative_path.to_string_lossy().replace('\\', "/")))
        .collect()
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[tokio::test]
async fn test_compare_partitions_one_level() {
    let fx = Fixture::new();
    write(&fx.source.join("new.txt"), "new");
    write(&fx.source.join("same.txt"), "same");
    write(&fx.source.join("size.txt"), "longer content");
    write(&fx.source.join("bytes.txt"), "aaaa");
    write(&fx.source.join("shared/inner.txt"), "inner");
    write(&fx.source.join("kind"), "file in source");

    write(&fx.replica.join("same.txt"), "same");
    write(&fx.replica.join("size.txt"), "short");
    write(&fx.replica.join("bytes.txt"), "bbbb");
    write(&fx.replica.join("shared/other.txt"), "other");
    write(&fx.replica.join("kind/child.txt"), "dir in replica");
    write(&fx.replica.join("stale.txt"), "stale");

    let storage = LocalStorage::default();
    let snapshot = compare(&storage, &fx.source, &fx.replica, Path::new(""))
        .await
        .unwrap();

    let names = |entries: &[StorageEntry]| -> Vec<String> {
        entries.iter().map(|e| e.display_name()).collect()
    };
    assert_eq!(names(&snapshot.source_only), vec!["new.txt"]);
    assert_eq!(names(&snapshot.replica_only), vec!["stale.txt"]);
    assert_eq!(names(&snapshot.identical), vec!["same.txt"]);
    let differing: Vec<String> = snapshot.differing.iter().map(|(s, _)| s.display_name()).collect();
    assert_eq!(differing, vec!["bytes.txt", "kind", "size.txt"]);
    assert_eq!(snapshot.common_dirs, vec![std::ffi::OsString::from("shared")]);

    // only the equal-size pairs were hashed
    assert_eq!(snapshot.fingerprinted, 2);
    assert!(!snapshot.is_in_sync());
}

#[tokio::test]
async fn test_matching_metadata_does_not_hide_content_change() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "AAAA");
    write(&fx.replica.join("a.txt"), "BBBB");
    let time = SystemTime::now() - Duration::from_secs(600);
    set_mtime(&fx.source.join("a.txt"), time);
    set_mtime(&fx.replica.join("a.txt"), time);

    let events = fx.pass().await;

    assert_eq!(summary(&events), vec![(Action::Overwrite, "a.txt".to_string())]);
    assert_eq!(fs::read_to_string(fx.replica.join("a.txt")).unwrap(), "AAAA");
}

#[test]
fn test_plan_orders_copy_overwrite_delete() {
    let entry = |name: &str, kind: EntryKind| StorageEntry {
        name: name.into(),
        path: PathBuf::from(name),
        kind,
        size: 1,
        modified: None,
        dangling: false,
    };
    let snapshot = crate::sync::DirectorySnapshot {
        relative: PathBuf::from("level"),
        source_only: vec![entry("c_new", EntryKind::File), entry("d_dir", EntryKind::Directory)],
        replica_only: vec![entry("a_old", EntryKind::File)],
        differing: vec![
            (entry("b_changed", EntryKind::File), entry("b_changed", EntryKind::File)),
            (entry("e_kind", EntryKind::Directory), entry("e_kind", EntryKind::File)),
        ],
        ..Default::default()
    };

    let dispositions = plan(&snapshot);

    let at = |name: &str| Path::new("level").join(name);
    assert_eq!(
        dispositions,
        vec![
            Disposition::new(Action::Copy, at("c_new"), EntryKind::File),
            Disposition::new(Action::Copy, at("d_dir"), EntryKind::Directory),
            Disposition::new(Action::Overwrite, at("b_changed"), EntryKind::File),
            Disposition::new(Action::Delete, at("e_kind"), EntryKind::File),
            Disposition::new(Action::Copy, at("e_kind"), EntryKind::Directory),
            Disposition::new(Action::Delete, at("a_old"), EntryKind::File),
        ]
    );
}

#[tokio::test]
async fn test_reference_example() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "hi");
    write(&fx.source.join("sub/b.txt"), "x");
    write(&fx.replica.join("a.txt"), "bye");
    write(&fx.replica.join("old.txt"), "z");

    let events = fx.pass().await;

    assert_eq!(
        summary(&events),
        vec![
            (Action::Copy, "sub".to_string()),
            (Action::Overwrite, "a.txt".to_string()),
            (Action::Delete, "old.txt".to_string()),
        ]
    );
    assert_eq!(tree(&fx.replica), tree(&fx.source));
    assert_eq!(fs::read_to_string(fx.replica.join("sub/b.txt")).unwrap(), "x");
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "hi");
    write(&fx.source.join("dir/nested/b.bin"), "bytes");
    write(&fx.replica.join("junk/c.txt"), "junk");

    assert!(!fx.pass().await.is_empty());

    let (result, events) = fx.pass_with(&LocalStorage::default()).await;
    let report = result.unwrap();
    assert!(events.is_empty());
    assert_eq!(report.total_operations(), 0);
    assert_eq!(report.files_identical, 2);
}

#[tokio::test]
async fn test_converges_from_arbitrary_replica() {
    let fx = Fixture::new();
    write(&fx.source.join("keep.txt"), "keep");
    write(&fx.source.join("docs/readme.md"), "# readme");
    write(&fx.source.join("docs/guide/intro.md"), "intro");
    write(&fx.source.join("docs/guide/deep/leaf.txt"), "leaf");
    fs::create_dir_all(fx.source.join("empty")).unwrap();

    write(&fx.replica.join("keep.txt"), "stale keep");
    write(&fx.replica.join("docs/readme.md"), "# readme");
    write(&fx.replica.join("docs/guide/extra.md"), "extra");
    write(&fx.replica.join("docs/guide/deep/leaf.txt"), "old leaf");
    write(&fx.replica.join("orphan/a/b/c.txt"), "orphan");

    fx.pass().await;

    assert_eq!(tree(&fx.replica), tree(&fx.source));

    let storage = LocalStorage::default();
    for (relative, content) in tree(&fx.source) {
        if content.is_some() {
            assert_eq!(
                storage.fingerprint(&fx.source.join(&relative)).await.unwrap(),
                storage.fingerprint(&fx.replica.join(&relative)).await.unwrap()
            );
        }
    }
}

#[tokio::test]
async fn test_empty_replica_gets_full_copy() {
    let fx = Fixture::new();
    write(&fx.source.join("a/b/c/d.txt"), "deep");
    write(&fx.source.join("top.txt"), "top");

    let events = fx.pass().await;

    assert_eq!(
        summary(&events),
        vec![
            (Action::Copy, "a".to_string()),
            (Action::Copy, "top.txt".to_string()),
        ]
    );
    assert_eq!(tree(&fx.replica), tree(&fx.source));
}

#[tokio::test]
async fn test_file_replaced_by_directory() {
    let fx = Fixture::new();
    write(&fx.source.join("thing/inside.txt"), "now a dir");
    write(&fx.replica.join("thing"), "was a file");

    let events = fx.pass().await;

    assert_eq!(
        summary(&events),
        vec![
            (Action::Delete, "thing".to_string()),
            (Action::Copy, "thing".to_string()),
        ]
    );
    assert!(fx.replica.join("thing").is_dir());
    assert_eq!(tree(&fx.replica), tree(&fx.source));
}

#[tokio::test]
async fn test_directory_replaced_by_file() {
    let fx = Fixture::new();
    write(&fx.source.join("thing"), "now a file");
    write(&fx.replica.join("thing/inside.txt"), "was a dir");

    let events = fx.pass().await;

    assert_eq!(
        summary(&events),
        vec![
            (Action::Delete, "thing".to_string()),
            (Action::Copy, "thing".to_string()),
        ]
    );
    assert!(events.iter().all(|e| e.action != Action::Overwrite));
    assert_eq!(fs::read_to_string(fx.replica.join("thing")).unwrap(), "now a file");
}

#[tokio::test]
async fn test_deep_change_is_scoped_to_its_path() {
    let fx = Fixture::new();
    write(&fx.source.join("x/y/z/file.txt"), "v1");
    write(&fx.source.join("x/sibling.txt"), "s");
    write(&fx.source.join("other/file.txt"), "o");
    fx.pass().await;

    write(&fx.source.join("x/y/z/file.txt"), "v2");
    let events = fx.pass().await;

    assert_eq!(
        summary(&events),
        vec![(Action::Overwrite, "x/y/z/file.txt".to_string())]
    );
    assert_eq!(fs::read_to_string(fx.replica.join("x/y/z/file.txt")).unwrap(), "v2");
}

#[tokio::test]
async fn test_events_carry_both_roots() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "hi");
    write(&fx.replica.join("gone.txt"), "bye");

    let events = fx.pass().await;
    let config = fx.config();

    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event.source_root, config.source());
        assert_eq!(event.replica_root, config.replica());
    }

    let copy_line = events[0].to_string();
    assert!(copy_line.contains(" | COPY \"a.txt\" FROM "));
    assert!(copy_line.ends_with(&format!(
        "FROM {} TO {}",
        config.source().display(),
        config.replica().display()
    )));

    let delete_line = events[1].to_string();
    assert!(delete_line.contains(" | DELETE \"gone.txt\" FROM "));
    assert!(delete_line.ends_with(&format!("FROM {}", config.replica().display())));
}

#[tokio::test]
async fn test_missing_source_root_aborts() {
    let fx = Fixture::new();
    fs::remove_dir_all(&fx.source).unwrap();

    let (result, events) = fx.pass_with(&LocalStorage::default()).await;

    assert!(matches!(result, Err(SyncError::NotFound { .. })));
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_missing_replica_root_aborts() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "hi");
    fs::remove_dir_all(&fx.replica).unwrap();

    let (result, events) = fx.pass_with(&LocalStorage::default()).await;

    assert!(matches!(result, Err(SyncError::NotFound { .. })));
    assert!(events.is_empty());
}

/// Local storage that refuses to write files with a given name.
struct FailingStorage {
    inner: LocalStorage,
    poison: &'static str,
}

#[async_trait::async_trait]
impl Storage for FailingStorage {
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>> {
        self.inner.list_dir(path).await
    }

    async fn fingerprint(&self, path: &Path) -> io::Result<ContentFingerprint> {
        self.inner.fingerprint(path).await
    }

    async fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        if dest.file_name().map_or(false, |n| n == self.poison) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.copy_file(src, dest).await
    }

    async fn copy_tree(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        self.inner.copy_tree(src, dest).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        self.inner.delete(path).await
    }
}

#[tokio::test]
async fn test_failed_operation_aborts_pass_without_event() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "a");
    write(&fx.source.join("b.txt"), "b");
    write(&fx.source.join("c.txt"), "c");
    write(&fx.replica.join("stale.txt"), "stale");

    let failing = FailingStorage {
        inner: LocalStorage::default(),
        poison: "b.txt",
    };
    let (result, events) = fx.pass_with(&failing).await;

    assert!(matches!(&result, Err(SyncError::Copy { to, .. }) if to.ends_with("b.txt")));
    // a.txt went through, b.txt failed, nothing after it ran
    assert_eq!(summary(&events), vec![(Action::Copy, "a.txt".to_string())]);
    assert!(fx.replica.join("a.txt").exists());
    assert!(!fx.replica.join("b.txt").exists());
    assert!(!fx.replica.join("c.txt").exists());
    assert!(fx.replica.join("stale.txt").exists());

    // the next healthy pass finishes the job
    let events = fx.pass().await;
    assert_eq!(
        summary(&events),
        vec![
            (Action::Copy, "b.txt".to_string()),
            (Action::Copy, "c.txt".to_string()),
            (Action::Delete, "stale.txt".to_string()),
        ]
    );
    assert_eq!(tree(&fx.replica), tree(&fx.source));
}

#[tokio::test]
async fn test_scheduler_alternates_and_survives_errors() {
    let fx = Fixture::new();
    write(&fx.source.join("a.txt"), "hi");

    let memory = MemoryConsumer::new();
    let mut consumers = ConsumerManager::new();
    consumers.add_consumer(Box::new(memory.clone()));

    let config = SyncConfig::new(
        fx.source.to_str().unwrap(),
        fx.replica.to_str().unwrap(),
        0.01,
        "sync.log",
    )
    .unwrap();
    let mut scheduler = Scheduler::new(config, Box::new(LocalStorage::default()), consumers);
    assert_eq!(scheduler.state(), SchedulerState::RunningPass);

    let state = scheduler.step().await;
    assert!(matches!(state, SchedulerState::Sleeping(d) if d > Duration::ZERO && d <= Duration::from_millis(10)));
    assert_eq!(scheduler.passes(), 1);
    assert_eq!(scheduler.last_report().unwrap().copied, 1);
    assert_eq!(memory.drain().len(), 1);

    assert_eq!(scheduler.step().await, SchedulerState::RunningPass);

    // a failing pass is logged, the loop keeps going
    fs::remove_dir_all(&fx.replica).unwrap();
    let state = scheduler.step().await;
    assert!(matches!(state, SchedulerState::Sleeping(_)));
    assert_eq!(scheduler.passes(), 2);
    assert!(scheduler.last_report().is_none());
    assert!(memory.events().is_empty());

    fs::create_dir_all(&fx.replica).unwrap();
    scheduler.step().await;
    scheduler.step().await;
    assert_eq!(scheduler.passes(), 3);
    assert_eq!(summary(&memory.events()), vec![(Action::Copy, "a.txt".to_string())]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_links_are_followed_not_replicated() {
    use std::os::unix::fs::symlink;

    let fx = Fixture::new();
    let outside = tempdir().unwrap();
    write(&outside.path().join("shared/data.txt"), "linked");
    symlink(outside.path().join("shared"), fx.source.join("linked_dir")).unwrap();
    symlink(outside.path().join("nowhere"), fx.source.join("broken")).unwrap();

    let events = fx.pass().await;

    assert_eq!(summary(&events), vec![(Action::Copy, "linked_dir".to_string())]);
    let copied = fx.replica.join("linked_dir");
    assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(copied.join("data.txt")).unwrap(), "linked");
    assert!(fs::symlink_metadata(fx.replica.join("broken")).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_only_files_keep_converging() {
    use std::os::unix::fs::PermissionsExt;

    let read_only = |path: &Path, on: bool| {
        let mode = if on { 0o444 } else { 0o644 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    };

    let fx = Fixture::new();
    write(&fx.source.join("ro.txt"), "v1");
    write(&fx.source.join("z_later.txt"), "v1");
    read_only(&fx.source.join("ro.txt"), true);
    // replica side starts with a stale read-only entry of its own
    write(&fx.replica.join("locked.txt"), "stale");
    read_only(&fx.replica.join("locked.txt"), true);
    write(&fx.source.join("locked.txt"), "fresh");

    fx.pass().await;
    assert_eq!(tree(&fx.replica), tree(&fx.source));

    read_only(&fx.source.join("ro.txt"), false);
    write(&fx.source.join("ro.txt"), "v2-changed");
    read_only(&fx.source.join("ro.txt"), true);
    write(&fx.source.join("z_later.txt"), "v2");

    let events = fx.pass().await;
    assert_eq!(
        summary(&events),
        vec![
            (Action::Overwrite, "ro.txt".to_string()),
            (Action::Overwrite, "z_later.txt".to_string()),
        ]
    );
    assert_eq!(fs::read_to_string(fx.replica.join("ro.txt")).unwrap(), "v2-changed");
    assert_eq!(tree(&fx.replica), tree(&fx.source));
    assert!(fx.pass().await.is_empty());
}

#[test]
fn test_config_rejects_unusable_intervals() {
    for secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-10, 1e20] {
        assert!(
            SyncConfig::new("src", "dst", secs, "sync.log").is_err(),
            "interval {} should be rejected",
            secs
        );
    }

    let config = SyncConfig::new("src", "dst", 1e-9, "sync.log").unwrap();
    assert_eq!(config.interval(), Duration::from_nanos(1));
    assert!(next_sleep(config.interval(), Duration::ZERO) > Duration::ZERO);
}

#[test]
fn test_config_normalizes_roots() {
    let config = SyncConfig::new("src", "backup/dst", 2.5, "sync.log").unwrap();
    let sep = std::path::MAIN_SEPARATOR;

    assert_eq!(config.source(), Path::new(&format!("src{}", sep)));
    assert_eq!(config.replica(), Path::new(&format!("backup/dst{}", sep)));
    assert_eq!(config.interval(), Duration::from_millis(2_500));
}
