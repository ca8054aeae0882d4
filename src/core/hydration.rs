/*
 * Restores the session from durable storage once per application start.
 *
 * `SessionHydrator::hydrate` performs the I/O half: it reads the persisted token
 * and asks the server who the token belongs to. It is blocking and runs on a
 * worker thread. `apply_hydration_outcome` is the commit half and runs on the
 * event loop, where the state container is mutated.
 *
 * Hydration never fails outward: unreadable storage resolves to `Absent`, and
 * an identity lookup that cannot reach the server resolves to `Unverified`.
 */
use crate::core::app_state::{AppStateContainer, Result as StateResult, StatePatch};
use crate::core::models::AuthSession;
use crate::core::remote_api::{FetchError, IdentityResolverOperations};
use crate::core::session_storage::{AUTH_TOKEN_KEY, SessionStorageOperations};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationOutcome {
    // A persisted token was found and the server confirmed its identity.
    Restored(AuthSession),
    // No token was persisted, or storage could not be read.
    Absent,
    // The server rejected the persisted token; it should be discarded.
    Rejected,
    /*
     * A token exists but its identity could not be confirmed (server unreachable
     * or malformed answer). The session stays absent; the token is kept so the
     * next start can try again.
     */
    Unverified,
}

impl HydrationOutcome {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            HydrationOutcome::Restored(session) => Some(session),
            _ => None,
        }
    }
}

pub struct SessionHydrator {
    storage: Arc<dyn SessionStorageOperations>,
    identity_resolver: Arc<dyn IdentityResolverOperations>,
}

impl SessionHydrator {
    pub fn new(
        storage: Arc<dyn SessionStorageOperations>,
        identity_resolver: Arc<dyn IdentityResolverOperations>,
    ) -> Self {
        SessionHydrator {
            storage,
            identity_resolver,
        }
    }

    pub fn hydrate(&self) -> HydrationOutcome {
        let token = match self.storage.get_item(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => token,
            Ok(_) => {
                log::debug!("SessionHydrator: No persisted token.");
                return HydrationOutcome::Absent;
            }
            Err(e) => {
                log::warn!("SessionHydrator: Storage unreadable, treating session as absent: {e}");
                return HydrationOutcome::Absent;
            }
        };

        match self.identity_resolver.resolve_identity(&token) {
            Ok(identity) => match AuthSession::new(token, identity.user_id, identity.role) {
                Ok(session) => {
                    log::info!(
                        "SessionHydrator: Restored session for user '{}'.",
                        session.user_id()
                    );
                    HydrationOutcome::Restored(session)
                }
                Err(e) => {
                    log::warn!("SessionHydrator: Server returned an unusable identity: {e}");
                    HydrationOutcome::Unverified
                }
            },
            Err(FetchError::Unauthorized) => {
                log::info!("SessionHydrator: Persisted token was rejected by the server.");
                HydrationOutcome::Rejected
            }
            Err(e) => {
                log::warn!("SessionHydrator: Could not verify persisted token: {e}");
                HydrationOutcome::Unverified
            }
        }
    }
}

/*
 * Commits a hydration outcome into the container. A restored session is merged
 * with `set_state` (the token is already persisted); a rejected token is
 * cleared through `logout`, the only action allowed to delete it.
 */
pub fn apply_hydration_outcome(
    container: &AppStateContainer,
    outcome: &HydrationOutcome,
) -> StateResult<()> {
    match outcome {
        HydrationOutcome::Restored(session) => {
            container.set_state(StatePatch::new().auth(Some(session.clone())))
        }
        HydrationOutcome::Rejected => container.logout(),
        HydrationOutcome::Absent | HydrationOutcome::Unverified => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Role;
    use crate::core::remote_api::{ResolvedIdentity, Result as FetchResult};
    use crate::core::session_storage::{CoreSessionStorage, Result as StorageResult, StorageError};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockIdentityResolver {
        result: Mutex<FetchResult<ResolvedIdentity>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockIdentityResolver {
        fn returning(result: FetchResult<ResolvedIdentity>) -> Arc<Self> {
            Arc::new(MockIdentityResolver {
                result: Mutex::new(result),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl IdentityResolverOperations for MockIdentityResolver {
        fn resolve_identity(&self, token: &str) -> FetchResult<ResolvedIdentity> {
            self.calls.lock().unwrap().push(token.to_string());
            self.result.lock().unwrap().clone()
        }
    }

    struct BrokenStorage;

    impl SessionStorageOperations for BrokenStorage {
        fn get_item(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable)
        }
        fn set_item(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable)
        }
        fn remove_item(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable)
        }
    }

    fn member_identity() -> FetchResult<ResolvedIdentity> {
        Ok(ResolvedIdentity {
            user_id: "user123".to_string(),
            role: Role::Member,
        })
    }

    fn temp_storage(dir: &tempfile::TempDir) -> Arc<CoreSessionStorage> {
        Arc::new(CoreSessionStorage::with_file(&dir.path().join("storage.json")))
    }

    #[test]
    fn test_hydrate_restores_persisted_token() {
        // Arrange
        crate::initialize_logging();
        let dir = tempdir().unwrap();
        let storage = temp_storage(&dir);
        storage.set_item(AUTH_TOKEN_KEY, "abc123").unwrap();
        let resolver = MockIdentityResolver::returning(member_identity());
        let hydrator = SessionHydrator::new(storage, resolver.clone());

        // Act
        let outcome = hydrator.hydrate();

        // Assert
        let session = outcome.session().expect("Session should be restored");
        assert_eq!(session.token(), "abc123");
        assert_eq!(session.user_id(), "user123");
        assert_eq!(*resolver.calls.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[test]
    fn test_hydrate_without_token_is_absent_and_skips_network() {
        let dir = tempdir().unwrap();
        let resolver = MockIdentityResolver::returning(member_identity());
        let hydrator = SessionHydrator::new(temp_storage(&dir), resolver.clone());

        assert_eq!(hydrator.hydrate(), HydrationOutcome::Absent);
        assert!(resolver.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_hydrate_with_broken_storage_is_absent() {
        let resolver = MockIdentityResolver::returning(member_identity());
        let hydrator = SessionHydrator::new(Arc::new(BrokenStorage), resolver);

        assert_eq!(hydrator.hydrate(), HydrationOutcome::Absent);
    }

    #[test]
    fn test_hydrate_classifies_identity_failures() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(&dir);
        storage.set_item(AUTH_TOKEN_KEY, "abc123").unwrap();

        let rejected = SessionHydrator::new(
            storage.clone(),
            MockIdentityResolver::returning(Err(FetchError::Unauthorized)),
        );
        assert_eq!(rejected.hydrate(), HydrationOutcome::Rejected);

        let offline = SessionHydrator::new(
            storage.clone(),
            MockIdentityResolver::returning(Err(FetchError::Transport("refused".into()))),
        );
        assert_eq!(offline.hydrate(), HydrationOutcome::Unverified);

        let blank_identity = SessionHydrator::new(
            storage,
            MockIdentityResolver::returning(Ok(ResolvedIdentity {
                user_id: String::new(),
                role: Role::Admin,
            })),
        );
        assert_eq!(blank_identity.hydrate(), HydrationOutcome::Unverified);
    }

    #[test]
    fn test_login_then_hydrate_round_trip() {
        // Arrange
        crate::initialize_logging();
        let dir = tempdir().unwrap();
        let storage = temp_storage(&dir);
        let first_run = AppStateContainer::create(storage.clone());
        first_run.login("t-round-trip", "user123", Role::Admin).unwrap();
        first_run.dispose();

        // Act: a fresh container on the same storage, as after a restart.
        let second_run = AppStateContainer::create(storage.clone());
        let hydrator = SessionHydrator::new(
            storage,
            MockIdentityResolver::returning(Ok(ResolvedIdentity {
                user_id: "user123".to_string(),
                role: Role::Admin,
            })),
        );
        let outcome = hydrator.hydrate();
        apply_hydration_outcome(&second_run, &outcome).unwrap();

        // Assert
        let state = second_run.get_state();
        assert_eq!(state.auth.unwrap().token(), "t-round-trip");
    }

    #[test]
    fn test_apply_rejected_outcome_clears_persisted_token() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(&dir);
        storage.set_item(AUTH_TOKEN_KEY, "expired").unwrap();
        let container = AppStateContainer::create(storage.clone());

        apply_hydration_outcome(&container, &HydrationOutcome::Rejected).unwrap();

        assert_eq!(storage.get_item(AUTH_TOKEN_KEY).unwrap(), None);
        assert!(container.get_state().auth.is_none());
    }

    #[test]
    fn test_apply_unverified_outcome_keeps_token_and_session_absent() {
        let dir = tempdir().unwrap();
        let storage = temp_storage(&dir);
        storage.set_item(AUTH_TOKEN_KEY, "abc123").unwrap();
        let container = AppStateContainer::create(storage.clone());

        apply_hydration_outcome(&container, &HydrationOutcome::Unverified).unwrap();

        assert_eq!(
            storage.get_item(AUTH_TOKEN_KEY).unwrap(),
            Some("abc123".to_string())
        );
        assert!(container.get_state().auth.is_none());
        assert_eq!(container.get_state().revision, 0);
    }
}
