//! Lazy, exactly-once backend binding
//!
//! The manager moves through `Unbound -> Binding -> Bound -> Closed`. Reads
//! of a bound handle only take the short state lock; binding is serialised by
//! a separate async lock and the state is checked again under it, so setup
//! runs at most once no matter how many tasks ask for the handle at the same
//! time. Closing never waits for the bind lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{Connector, ObjectBackend};
use crate::error::{Error, Phase, Result};
use crate::locator::RepositoryLocator;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Unbound,
    Binding,
    Bound,
    Closed,
}

enum State<B> {
    Unbound,
    Binding,
    Bound(Arc<B>),
    Closed,
}

impl<B> State<B> {
    fn phase(&self) -> ConnectionPhase {
        match self {
            State::Unbound => ConnectionPhase::Unbound,
            State::Binding => ConnectionPhase::Binding,
            State::Bound(_) => ConnectionPhase::Bound,
            State::Closed => ConnectionPhase::Closed,
        }
    }
}

/// Owns the bound backend handle of one transport instance
pub struct ConnectionManager<C: Connector> {
    connector: C,
    locator: RepositoryLocator,
    state: Mutex<State<C::Backend>>,
    bind_lock: tokio::sync::Mutex<()>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, locator: RepositoryLocator) -> Self {
        Self {
            connector,
            locator,
            state: Mutex::new(State::Unbound),
            bind_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn locator(&self) -> &RepositoryLocator {
        &self.locator
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.lock_state().phase()
    }

    /// Bind the backend if needed. Starts a new session after `close`.
    pub async fn open(&self) -> Result<Arc<C::Backend>> {
        self.bind(true).await
    }

    /// The bound backend, binding lazily on first use.
    ///
    /// Fails once the connection has been closed.
    pub async fn handle(&self) -> Result<Arc<C::Backend>> {
        self.bind(false).await
    }

    /// Drop the bound handle and release it. Safe to call repeatedly.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), State::Closed);

        if let State::Bound(backend) = previous {
            backend.shutdown().await;
            tracing::info!(
                backend = self.connector.name(),
                repository = %self.locator,
                "Connection closed"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State<C::Backend>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bound(&self) -> Option<Arc<C::Backend>> {
        match &*self.lock_state() {
            State::Bound(backend) => Some(backend.clone()),
            _ => None,
        }
    }

    async fn bind(&self, reopen: bool) -> Result<Arc<C::Backend>> {
        if let Some(backend) = self.bound() {
            return Ok(backend);
        }

        let _guard = self.bind_lock.lock().await;

        {
            let mut state = self.lock_state();
            match &*state {
                State::Bound(backend) => return Ok(backend.clone()),
                State::Closed if !reopen => {
                    return Err(Error::transfer(format!(
                        "connection to {} is closed",
                        self.locator
                    )));
                }
                // A binder that was cancelled mid-setup leaves Binding behind
                State::Unbound | State::Binding | State::Closed => {}
            }
            *state = State::Binding;
        }

        tracing::debug!(
            backend = self.connector.name(),
            repository = %self.locator,
            "Binding backend"
        );

        let backend = match self.connector.connect(&self.locator).await {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                let mut state = self.lock_state();
                if matches!(*state, State::Binding) {
                    *state = State::Unbound;
                }
                return Err(e.translate(Phase::Setup, self.locator.raw()));
            }
        };

        let installed = {
            let mut state = self.lock_state();
            if matches!(*state, State::Binding) {
                *state = State::Bound(backend.clone());
                true
            } else {
                false
            }
        };

        if !installed {
            backend.shutdown().await;
            return Err(Error::transfer(format!(
                "connection to {} closed while binding",
                self.locator
            )));
        }

        tracing::info!(
            backend = self.connector.name(),
            bucket = self.locator.host(),
            prefix = self.locator.prefix(),
            "Connection bound"
        );
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn locator() -> RepositoryLocator {
        RepositoryLocator::parse("mem://artifacts/releases").unwrap()
    }

    #[tokio::test]
    async fn test_lazy_bind_on_first_handle() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let counters = connector.counters();
        let manager = ConnectionManager::new(connector, locator());

        assert_eq!(manager.phase(), ConnectionPhase::Unbound);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 0);

        let first = manager.handle().await.unwrap();
        let second = manager.handle().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.phase(), ConnectionPhase::Bound);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_binds_once() {
        let connector = MemoryConnector::new()
            .with_bucket("artifacts")
            .with_setup_delay(Duration::from_millis(50));
        let counters = connector.counters();
        let manager = Arc::new(ConnectionManager::new(connector, locator()));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.open().await.unwrap() }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_missing_bucket_is_not_found() {
        let manager = ConnectionManager::new(MemoryConnector::new(), locator());
        match manager.open().await {
            Err(Error::NotFound(ctx)) => assert_eq!(ctx, "mem://artifacts/releases"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("bucket should be missing"),
        }
        assert_eq!(manager.phase(), ConnectionPhase::Unbound);
    }

    #[tokio::test]
    async fn test_setup_failure_is_auth_and_retryable() {
        let connector = MemoryConnector::new()
            .with_bucket("artifacts")
            .with_setup_failure("no credentials in chain");
        let counters = connector.counters();
        let manager = ConnectionManager::new(connector, locator());

        assert!(matches!(manager.open().await, Err(Error::Auth { .. })));
        assert!(matches!(manager.open().await, Err(Error::Auth { .. })));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_twice_releases_once() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let counters = connector.counters();
        let manager = ConnectionManager::new(connector, locator());

        manager.open().await.unwrap();
        manager.close().await;
        manager.close().await;

        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(manager.phase(), ConnectionPhase::Closed);
        assert!(matches!(manager.handle().await, Err(Error::Transfer { .. })));
    }

    #[tokio::test]
    async fn test_close_without_open_is_noop() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let counters = connector.counters();
        let manager = ConnectionManager::new(connector, locator());

        manager.close().await;
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 0);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reopen_after_close_starts_new_session() {
        let connector = MemoryConnector::new().with_bucket("artifacts");
        let counters = connector.counters();
        let manager = ConnectionManager::new(connector, locator());

        let first = manager.open().await.unwrap();
        manager.close().await;
        let second = manager.open().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 2);
        assert_eq!(manager.phase(), ConnectionPhase::Bound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_during_binding() {
        let connector = MemoryConnector::new()
            .with_bucket("artifacts")
            .with_setup_delay(Duration::from_millis(200));
        let counters = connector.counters();
        let manager = Arc::new(ConnectionManager::new(connector, locator()));

        let opener = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.open().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.phase(), ConnectionPhase::Binding);

        // Must return while setup is still in flight
        tokio::time::timeout(Duration::from_millis(100), manager.close())
            .await
            .expect("close blocked on binding");
        manager.close().await;

        let opened = opener.await.unwrap();
        assert!(matches!(opened, Err(Error::Transfer { .. })));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(manager.phase(), ConnectionPhase::Closed);
    }
}
