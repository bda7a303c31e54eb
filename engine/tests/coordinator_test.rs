//! Integration tests for change-event handling: debounced reloads,
//! targeted invalidation, and open-file behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{find_node, MockFs};
use specdeck_engine::config::EngineConfig;
use specdeck_engine::provider::FileSystemProvider;
use specdeck_engine::session::Session;
use specdeck_engine::types::{ChangeEvent, ChangeKind, Progress};

fn session_with(fs: &Arc<MockFs>) -> Session {
    let provider: Arc<dyn FileSystemProvider> = fs.clone();
    Session::new("tab-1", provider, EngineConfig::default())
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}

/// Opens a two-change project and waits for both load phases.
async fn open_project(fs: &Arc<MockFs>) -> Session {
    fs.add_file("/proj/changes/alpha/tasks.md", "- [x] a\n- [ ] b\n");
    fs.add_file("/proj/changes/beta/tasks.md", "- [x] a\n");
    let session = session_with(fs);
    session.open_project("/proj").await;
    settle().await;
    session
}

#[tokio::test(start_paused = true)]
async fn event_bursts_collapse_to_one_reload() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;

    // Shallow pass plus delayed full pass.
    assert_eq!(fs.list_count("/proj/changes"), 2);

    for _ in 0..5 {
        fs.emit("tab-1", ChangeKind::Modified, "/proj/changes/alpha/design.md")
            .await;
    }
    settle().await;

    // One debounced reload generation: one shallow and one full pass.
    assert_eq!(fs.list_count("/proj/changes"), 4);
    drop(session);
}

#[tokio::test(start_paused = true)]
async fn checklist_event_invalidates_only_the_owning_folder() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;

    assert_eq!(fs.read_count("/proj/changes/alpha/tasks.md"), 1);
    assert_eq!(fs.read_count("/proj/changes/beta/tasks.md"), 1);

    fs.add_file("/proj/changes/alpha/tasks.md", "- [x] a\n- [x] b\n");
    fs.emit("tab-1", ChangeKind::Modified, "/proj/changes/alpha/tasks.md")
        .await;
    settle().await;

    // Alpha recomputed from the live file; beta untouched by the
    // invalidation and served from cache on the reload.
    assert_eq!(fs.read_count("/proj/changes/alpha/tasks.md"), 2);
    assert_eq!(fs.read_count("/proj/changes/beta/tasks.md"), 1);

    let snapshot = session.snapshot().await;
    assert_eq!(
        find_node(&snapshot.changes, "changes/alpha").unwrap().progress,
        Some(Progress { completed: 2, total: 2 })
    );
    assert_eq!(
        find_node(&snapshot.changes, "changes/beta").unwrap().progress,
        Some(Progress { completed: 1, total: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn open_file_deletion_clears_immediately() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;
    session.load_file("changes/alpha/tasks.md").await;
    assert!(session.snapshot().await.current_file.is_some());

    let lists_before = fs.list_count("/proj/changes");
    fs.emit("tab-1", ChangeKind::Removed, "/proj/changes/alpha/tasks.md")
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snapshot = session.snapshot().await;
    assert!(
        snapshot.current_file.is_none(),
        "deletion clears without waiting for any debounce"
    );
    assert_eq!(
        fs.list_count("/proj/changes"),
        lists_before,
        "the debounced reload has not fired yet"
    );
}

#[tokio::test(start_paused = true)]
async fn open_file_change_schedules_a_fast_reread() {
    let fs = MockFs::new();
    fs.add_file("/proj/changes/alpha/design.md", "v1");
    let session = open_project(&fs).await;

    session.load_file("changes/alpha/design.md").await;
    assert_eq!(fs.read_count("/proj/changes/alpha/design.md"), 1);

    fs.add_file("/proj/changes/alpha/design.md", "v2");
    fs.emit("tab-1", ChangeKind::Modified, "/proj/changes/alpha/design.md")
        .await;

    // Past the file-reload delay (150ms) but short of the reload
    // debounce (300ms): the open file is fresh, the reload still pending.
    let lists_before = fs.list_count("/proj/changes");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fs.read_count("/proj/changes/alpha/design.md"), 2);
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.current_file.unwrap().content, "v2");
    assert_eq!(fs.list_count("/proj/changes"), lists_before);

    settle().await;
    assert!(fs.list_count("/proj/changes") > lists_before, "reload follows");
}

#[tokio::test(start_paused = true)]
async fn foreign_subscription_events_are_ignored() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;

    let lists_before = fs.list_count("/proj/changes");
    fs.emit_raw(
        "tab-1",
        ChangeEvent {
            key: "tab-99".to_string(),
            kind: ChangeKind::Modified,
            path: "/proj/changes/alpha/tasks.md".to_string(),
        },
    )
    .await;
    settle().await;

    assert_eq!(fs.list_count("/proj/changes"), lists_before);
    assert_eq!(fs.read_count("/proj/changes/alpha/tasks.md"), 1);
    drop(session);
}

#[tokio::test(start_paused = true)]
async fn rewatching_the_same_root_is_a_noop() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;
    assert_eq!(fs.watch_count(), 1);

    session.load_project().await;
    settle().await;

    assert_eq!(fs.watch_count(), 1, "same root must not re-subscribe");
    assert_eq!(fs.unwatch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn events_outside_the_project_root_are_ignored() {
    let fs = MockFs::new();
    let session = open_project(&fs).await;

    let lists_before = fs.list_count("/proj/changes");
    fs.emit("tab-1", ChangeKind::Modified, "/elsewhere/file.md").await;
    settle().await;

    assert_eq!(fs.list_count("/proj/changes"), lists_before);
    drop(session);
}
