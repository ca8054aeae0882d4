/*
 * This module consolidates the core, platform-agnostic logic of the client.
 * It re-exports the session model, the durable session storage
 * (`SessionStorageOperations`), configuration (`ConfigManagerOperations`), the
 * application state container, the remote data cache, the HTTP boundary
 * (`RemoteFetchOperations`, `IdentityResolverOperations`), and the session
 * hydration task.
 */
pub mod app_state;
pub mod config;
pub mod hydration;
pub mod models;
pub mod path_utils;
pub mod remote_api;
pub mod remote_cache;
pub mod session_storage;

// Re-export key structures and enums
pub use models::{AppState, AuthSession, ReportEntry, Role, placeholder_reports};

// Re-export state container related items
pub use app_state::{AppStateContainer, LoginOutcome, StatePatch, Subscription};

// Re-export storage related items
pub use session_storage::{CoreSessionStorage, SessionStorageOperations};

// Re-export config related items
pub use config::{CoreConfigManager, load_config_or_defaults};

// Re-export remote data related items
pub use remote_api::{FetchError, HttpApiClient, IdentityResolverOperations, RemoteFetchOperations};
pub use remote_cache::{CacheLookup, FetchCommit, FetchTicket, RemoteDataCache, ResourceKey};

pub use hydration::{HydrationOutcome, SessionHydrator, apply_hydration_outcome};
