//! Session multiplexer.
//!
//! An explicit registry of tab id → session with a hard capacity cap.
//! Opening a project past the cap is rejected with
//! [`EngineError::TabCapacity`] — capacity is a limit, not a cache, so
//! nothing is evicted. Closing a tab tears its session down fully before
//! removal, and closing the last tab always leaves exactly one blank tab
//! behind.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::provider::FileSystemProvider;
use crate::session::Session;

/// Title shown for a tab with no project loaded.
const BLANK_TAB_TITLE: &str = "untitled";

/// One open tab.
struct Tab {
    id: u64,
    title: String,
    session: Session,
}

/// Listing entry describing one tab to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: u64,
    pub title: String,
    pub is_active: bool,
}

struct TabsInner {
    tabs: Vec<Tab>,
    active_id: u64,
    next_id: u64,
}

/// Registry of all open tabs, bounded by `max_tabs`.
pub struct TabManager {
    provider: Arc<dyn FileSystemProvider>,
    config: EngineConfig,
    inner: Mutex<TabsInner>,
}

impl TabManager {
    /// Creates a manager with a single blank tab.
    pub fn new(provider: Arc<dyn FileSystemProvider>, config: EngineConfig) -> Self {
        let first = Tab {
            id: 1,
            title: BLANK_TAB_TITLE.to_string(),
            session: Session::new("tab-1", Arc::clone(&provider), config.clone()),
        };
        Self {
            provider,
            config,
            inner: Mutex::new(TabsInner {
                tabs: vec![first],
                active_id: 1,
                next_id: 1,
            }),
        }
    }

    /// Opens a new blank tab and makes it active.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TabCapacity`] when the cap is reached; the
    /// existing tab set is untouched.
    pub async fn new_tab(&self) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        if inner.tabs.len() >= self.config.max_tabs {
            return Err(EngineError::TabCapacity {
                max: self.config.max_tabs,
            });
        }
        let tab = self.blank_tab(&mut inner);
        let id = tab.id;
        inner.tabs.push(tab);
        inner.active_id = id;
        info!(tab_id = id, "Opened new tab");
        Ok(id)
    }

    /// Closes a tab, tearing its session down first. Closing the last
    /// tab replaces it with a blank one — the manager never holds zero
    /// tabs.
    pub async fn close_tab(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let index = inner
            .tabs
            .iter()
            .position(|tab| tab.id == id)
            .ok_or(EngineError::NoSuchTab(id))?;

        inner.tabs[index].session.reset().await;
        inner.tabs.remove(index);
        info!(tab_id = id, "Closed tab");

        if inner.tabs.is_empty() {
            let replacement = self.blank_tab(&mut inner);
            inner.active_id = replacement.id;
            inner.tabs.push(replacement);
            return Ok(());
        }

        if inner.active_id == id {
            let fallback = index.min(inner.tabs.len() - 1);
            inner.active_id = inner.tabs[fallback].id;
        }
        Ok(())
    }

    /// Makes a tab active. Unknown ids are ignored.
    pub async fn set_active_tab(&self, id: u64) {
        let mut inner = self.inner.lock().await;
        if inner.tabs.iter().any(|tab| tab.id == id) {
            inner.active_id = id;
        }
    }

    /// The active tab's session.
    pub async fn active_session(&self) -> Session {
        let inner = self.inner.lock().await;
        let active_id = inner.active_id;
        inner
            .tabs
            .iter()
            .find(|tab| tab.id == active_id)
            .unwrap_or(&inner.tabs[0])
            .session
            .clone()
    }

    /// The session behind a specific tab.
    pub async fn session(&self, id: u64) -> Result<Session> {
        let inner = self.inner.lock().await;
        inner
            .tabs
            .iter()
            .find(|tab| tab.id == id)
            .map(|tab| tab.session.clone())
            .ok_or(EngineError::NoSuchTab(id))
    }

    /// Opens a project in the active tab when it is blank, otherwise in a
    /// new tab. Fails with a capacity error when a new tab would exceed
    /// the cap.
    pub async fn open_project(&self, path: &str) -> Result<u64> {
        let active = self.active_session().await;
        let id = if active.has_project().await {
            self.new_tab().await?
        } else {
            let inner = self.inner.lock().await;
            inner.active_id
        };

        let session = self.session(id).await?;
        session.open_project(path).await;
        self.sync_title(id).await;
        Ok(id)
    }

    /// Re-derives a tab's title from its session's project name.
    pub async fn sync_title(&self, id: u64) {
        let session = match self.session(id).await {
            Ok(session) => session,
            Err(_) => return,
        };
        let title = if session.has_project().await {
            session.project_name().await
        } else {
            BLANK_TAB_TITLE.to_string()
        };
        let mut inner = self.inner.lock().await;
        if let Some(tab) = inner.tabs.iter_mut().find(|tab| tab.id == id) {
            debug!(tab_id = id, title = %title, "Tab title updated");
            tab.title = title;
        }
    }

    /// Lists all tabs in order.
    pub async fn tabs(&self) -> Vec<TabInfo> {
        let inner = self.inner.lock().await;
        inner
            .tabs
            .iter()
            .map(|tab| TabInfo {
                id: tab.id,
                title: tab.title.clone(),
                is_active: tab.id == inner.active_id,
            })
            .collect()
    }

    /// Number of open tabs.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.tabs.len()
    }

    /// Always false: the manager never holds zero tabs.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.tabs.is_empty()
    }

    fn blank_tab(&self, inner: &mut TabsInner) -> Tab {
        inner.next_id += 1;
        let id = inner.next_id;
        Tab {
            id,
            title: BLANK_TAB_TITLE.to_string(),
            session: Session::new(
                format!("tab-{id}"),
                Arc::clone(&self.provider),
                self.config.clone(),
            ),
        }
    }
}
