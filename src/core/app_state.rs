/*
 * This module defines the AppStateContainer, the single writer of the client's
 * in-memory state: the authenticated session, user preferences, and the
 * projection of fetched domain data (`reports`).
 *
 * The container is constructed explicitly (`create`) and injected into the
 * components that need it; it is torn down with `dispose`. Reads go through
 * `get_state`, which returns a snapshot. Mutations go through three actions:
 * `login`, `logout`, and `set_state`. Each committed mutation bumps the snapshot
 * revision and notifies all subscribers synchronously, in registration order.
 * A mutation issued from within a listener is queued and delivered after the
 * current notification round, so listeners always observe commits in order.
 *
 * `login` and `logout` are the only writers of the persisted session token.
 */
use crate::core::models::{
    AppState, AuthSession, InvalidSessionError, ReportEntry, Role, UserPreferences,
};
use crate::core::session_storage::{AUTH_TOKEN_KEY, SessionStorageOperations};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    InvalidSession(InvalidSessionError),
    // The container was disposed; no further mutations are accepted.
    Disposed,
}

impl From<InvalidSessionError> for StateError {
    fn from(err: InvalidSessionError) -> Self {
        StateError::InvalidSession(err)
    }
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::InvalidSession(e) => write!(f, "Rejected invalid session: {e}"),
            StateError::Disposed => write!(f, "State container has been disposed"),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::InvalidSession(e) => Some(e),
            StateError::Disposed => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StateError>;

/*
 * Whether a successful `login` also reached durable storage. `MemoryOnly` means
 * the session is active now but will not survive a restart.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Persisted,
    MemoryOnly,
}

/*
 * A partial update for `set_state`. `None` leaves a field untouched; for the
 * optional fields `Some(None)` clears them.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub auth: Option<Option<AuthSession>>,
    pub user_preferences: Option<UserPreferences>,
    pub reports: Option<Option<Vec<ReportEntry>>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth(mut self, auth: Option<AuthSession>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn reports(mut self, reports: Option<Vec<ReportEntry>>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.auth.is_none() && self.user_preferences.is_none() && self.reports.is_none()
    }
}

type Listener = Arc<dyn Fn(&AppState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ListenerRegistry {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

/*
 * Handle returned by `subscribe`. Dropping it keeps the listener registered;
 * call `unsubscribe` to remove it.
 */
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    // Returns false if the listener was already gone (or the container disposed).
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

struct ContainerInner {
    state: AppState,
    disposed: bool,
}

pub struct AppStateContainer {
    inner: Mutex<ContainerInner>,
    registry: Arc<ListenerRegistry>,
    next_subscription_id: AtomicU64,
    pending_notifications: Mutex<VecDeque<AppState>>,
    notifying: AtomicBool,
    storage: Arc<dyn SessionStorageOperations>,
}

impl AppStateContainer {
    /*
     * Creates a container with no session, default preferences and no reports.
     * `storage` is where `login` persists and `logout` removes the session token.
     */
    pub fn create(storage: Arc<dyn SessionStorageOperations>) -> Arc<Self> {
        log::debug!("AppStateContainer: Created.");
        Arc::new(AppStateContainer {
            inner: Mutex::new(ContainerInner {
                state: AppState::default(),
                disposed: false,
            }),
            registry: Arc::new(ListenerRegistry {
                listeners: Mutex::new(Vec::new()),
            }),
            next_subscription_id: AtomicU64::new(1),
            pending_notifications: Mutex::new(VecDeque::new()),
            notifying: AtomicBool::new(false),
            storage,
        })
    }

    /*
     * Ends the container's lifetime: drops every listener and rejects further
     * mutations with `StateError::Disposed`. The last snapshot stays readable.
     */
    pub fn dispose(&self) {
        self.lock_inner().disposed = true;
        self.registry.lock().clear();
        log::debug!("AppStateContainer: Disposed.");
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        self.lock_inner().disposed
    }

    pub fn get_state(&self) -> AppState {
        self.lock_inner().state.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        self.registry.lock().push((id, Arc::new(listener)));
        log::trace!("AppStateContainer: Listener {id:?} subscribed.");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /*
     * Installs a fully populated session, overwriting any existing one, and
     * writes its token to durable storage as part of the same action. A new
     * session starts without the previous session's reports. A storage failure
     * does not undo the in-memory login; it is reported through
     * `LoginOutcome::MemoryOnly`.
     *
     * The token is written before subscribers are notified, so a listener that
     * logs out in response sees its token removal stick.
     */
    pub fn login(&self, token: &str, user_id: &str, role: Role) -> Result<LoginOutcome> {
        let session = AuthSession::new(token, user_id, role)?;
        self.stage(|state| {
            state.auth = Some(session);
            state.reports = None;
            true
        })?;

        let outcome = match self.storage.set_item(AUTH_TOKEN_KEY, token) {
            Ok(()) => {
                log::info!("AppStateContainer: Logged in user '{user_id}' ({role}).");
                LoginOutcome::Persisted
            }
            Err(e) => {
                log::warn!(
                    "AppStateContainer: Logged in user '{user_id}' but the token was not persisted: {e}"
                );
                LoginOutcome::MemoryOnly
            }
        };
        self.drain_notifications();
        Ok(outcome)
    }

    /*
     * Clears the session and the user's reports projection, and removes the
     * persisted token. Calling it while logged out changes nothing in memory and
     * notifies nobody, but still removes any stale persisted token.
     */
    pub fn logout(&self) -> Result<()> {
        let changed = self.commit(|state| {
            if state.auth.is_none() && state.reports.is_none() {
                return false;
            }
            state.auth = None;
            state.reports = None;
            true
        })?;

        if let Err(e) = self.storage.remove_item(AUTH_TOKEN_KEY) {
            log::warn!("AppStateContainer: Failed to remove persisted token: {e}");
        }
        if changed {
            log::info!("AppStateContainer: Logged out.");
        } else {
            log::debug!("AppStateContainer: Logout while already logged out; nothing to clear.");
        }
        Ok(())
    }

    /*
     * Merges a partial update. A patch carrying a session that fails validation
     * is rejected as a whole, so no field of it is applied. Does not touch
     * durable storage.
     */
    pub fn set_state(&self, patch: StatePatch) -> Result<()> {
        if let Some(Some(session)) = &patch.auth {
            session.validate()?;
        }
        if patch.is_empty() {
            return Ok(());
        }
        self.commit(move |state| {
            if let Some(auth) = patch.auth {
                state.auth = auth;
            }
            if let Some(preferences) = patch.user_preferences {
                state.user_preferences = preferences;
            }
            if let Some(reports) = patch.reports {
                state.reports = reports;
            }
            true
        })?;
        Ok(())
    }

    fn lock_inner(&self) -> MutexGuard<'_, ContainerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Applies `mutate` and delivers the resulting notification.
    fn commit<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut AppState) -> bool,
    {
        let changed = self.stage(mutate)?;
        if changed {
            self.drain_notifications();
        }
        Ok(changed)
    }

    /*
     * Applies `mutate` under the state lock. If it reports a change, the revision
     * is bumped and the new snapshot is queued for delivery. Delivery is left to
     * `drain_notifications`, which runs after the lock is released so listeners
     * may read or mutate the container.
     */
    fn stage<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut AppState) -> bool,
    {
        let snapshot = {
            let mut inner = self.lock_inner();
            if inner.disposed {
                return Err(StateError::Disposed);
            }
            if !mutate(&mut inner.state) {
                return Ok(false);
            }
            inner.state.revision += 1;
            inner.state.clone()
        };
        log::trace!("AppStateContainer: Committed revision {}.", snapshot.revision);
        self.lock_pending().push_back(snapshot);
        Ok(true)
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<AppState>> {
        self.pending_notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Only the outermost caller delivers; nested commits just enqueue.
    fn drain_notifications(&self) {
        loop {
            if self.notifying.swap(true, Ordering::AcqRel) {
                return;
            }
            while let Some(snapshot) = self.next_pending() {
                let listeners: Vec<Listener> = self
                    .registry
                    .lock()
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                for listener in listeners {
                    listener(&snapshot);
                }
            }
            self.notifying.store(false, Ordering::Release);
            if self.lock_pending().is_empty() {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<AppState> {
        self.lock_pending().pop_front()
    }
}
