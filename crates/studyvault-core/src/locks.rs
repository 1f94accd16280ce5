//! Per-workspace serialization of file mutations.
//!
//! A rename, move or delete touches the file system and then the usage
//! table. Holding the workspace guard across both steps keeps two
//! overlapping relocations from interleaving.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::paths;

/// Registry of one async mutex per workspace root.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held while a workspace is being mutated.
#[derive(Debug)]
pub struct WorkspaceGuard {
    workspace: String,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceGuard {
    pub fn workspace(&self) -> &str {
        &self.workspace
    }
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, workspace: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(map.entry(workspace.to_string()).or_default())
    }

    /// Wait for exclusive access to `base_path`.
    pub async fn lock(&self, base_path: &str) -> WorkspaceGuard {
        let workspace = paths::normalize(base_path);
        let mutex = self.entry(&workspace);
        let guard = mutex.lock_owned().await;
        tracing::trace!(workspace = %workspace, "Acquired workspace lock");
        WorkspaceGuard {
            workspace,
            _guard: guard,
        }
    }

    /// Lock two workspaces for a cross-workspace move.
    ///
    /// Locks are taken in a fixed order so concurrent opposite moves cannot
    /// deadlock. The same workspace is locked once.
    pub async fn lock_pair(&self, a: &str, b: &str) -> (WorkspaceGuard, Option<WorkspaceGuard>) {
        let a = paths::normalize(a);
        let b = paths::normalize(b);
        if a == b {
            return (self.lock(&a).await, None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(&first).await;
        let second = self.lock(&second).await;
        (first, Some(second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn same_workspace_is_exclusive() {
        let locks = WorkspaceLocks::new();
        let guard = locks.lock("/ws").await;
        assert!(tokio::time::timeout(WAIT, locks.lock("/ws/")).await.is_err());
        drop(guard);
        assert!(tokio::time::timeout(WAIT, locks.lock("/ws")).await.is_ok());
    }

    #[tokio::test]
    async fn different_workspaces_do_not_block() {
        let locks = WorkspaceLocks::new();
        let _a = locks.lock("/ws-a").await;
        assert!(tokio::time::timeout(WAIT, locks.lock("/ws-b")).await.is_ok());
    }

    #[tokio::test]
    async fn pair_on_same_workspace_locks_once() {
        let locks = WorkspaceLocks::new();
        let (first, second) = locks.lock_pair("/ws", "/ws").await;
        assert_eq!(first.workspace(), "/ws");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn pair_orders_locks() {
        let locks = WorkspaceLocks::new();
        let (first, second) = locks.lock_pair("/zz", "/aa").await;
        assert_eq!(first.workspace(), "/aa");
        assert_eq!(second.map(|g| g.workspace().to_string()), Some("/zz".to_string()));
    }
}
