/*
 * Defines the core data structures shared across the client: the authenticated
 * session, user preferences, report records returned by the API, and the
 * application state snapshot handed to subscribers. These types are plain data;
 * the rules for mutating them live in `app_state`.
 */
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/*
 * The access level carried by an authenticated session. Routing currently only
 * distinguishes between "session present" and "session absent", so the role is
 * carried along for views without being branched on by the guard.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InvalidSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(InvalidSessionError::UnknownRole(other.to_string())),
        }
    }
}

// Reasons an `AuthSession` could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSessionError {
    EmptyToken,
    EmptyUserId,
    UnknownRole(String),
}

impl fmt::Display for InvalidSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidSessionError::EmptyToken => write!(f, "session token must not be empty"),
            InvalidSessionError::EmptyUserId => write!(f, "session user id must not be empty"),
            InvalidSessionError::UnknownRole(role) => write!(f, "unknown role '{role}'"),
        }
    }
}

impl std::error::Error for InvalidSessionError {}

/*
 * The authenticated identity of the current client session.
 * A session is either fully populated or absent (`Option<AuthSession>` at the use
 * sites). The fields are private and every construction path, including
 * deserialization, goes through `AuthSession::new`, so a half-filled session
 * cannot exist.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthSessionRecord")]
pub struct AuthSession {
    token: String,
    user_id: String,
    role: Role,
}

// Unvalidated wire shape used only to funnel deserialization through `AuthSession::new`.
#[derive(Deserialize)]
struct AuthSessionRecord {
    token: String,
    user_id: String,
    role: Role,
}

impl TryFrom<AuthSessionRecord> for AuthSession {
    type Error = InvalidSessionError;

    fn try_from(record: AuthSessionRecord) -> Result<Self, Self::Error> {
        AuthSession::new(record.token, record.user_id, record.role)
    }
}

impl AuthSession {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
    ) -> Result<Self, InvalidSessionError> {
        let session = AuthSession {
            token: token.into(),
            user_id: user_id.into(),
            role,
        };
        session.validate()?;
        Ok(session)
    }

    /*
     * Re-checks the all-or-nothing invariant. Called at construction and again by
     * the state container at the point a session is merged into the state.
     */
    pub fn validate(&self) -> Result<(), InvalidSessionError> {
        if self.token.trim().is_empty() {
            return Err(InvalidSessionError::EmptyToken);
        }
        if self.user_id.trim().is_empty() {
            return Err(InvalidSessionError::EmptyUserId);
        }
        Ok(())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/*
 * Opaque per-session settings blob. The core never interprets the values; views
 * read them by key.
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

// A single row of the `/api/reports` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub tasks: u32,
}

impl ReportEntry {
    pub fn new(name: &str, tasks: u32) -> Self {
        ReportEntry {
            name: name.to_string(),
            tasks,
        }
    }
}

/*
 * The dataset the reports view shows when no fetched reports are available,
 * either because the fetch has not completed or because it failed.
 */
pub fn placeholder_reports() -> Vec<ReportEntry> {
    vec![
        ReportEntry::new("This Week", 4),
        ReportEntry::new("Last Week", 3),
        ReportEntry::new("Two Weeks Ago", 7),
        ReportEntry::new("Three Weeks Ago", 2),
    ]
}

/*
 * An immutable snapshot of the application state as handed out by
 * `AppStateContainer::get_state` and to subscribers. `reports` is a projection of
 * the remote data cache kept here so that views read one consistent snapshot.
 * `revision` increases by one with every committed mutation.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub auth: Option<AuthSession>,
    pub user_preferences: UserPreferences,
    pub reports: Option<Vec<ReportEntry>>,
    pub revision: u64,
}

impl AppState {
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }
}
