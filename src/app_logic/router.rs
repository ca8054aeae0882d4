/*
 * The route table and the route guard.
 *
 * `Route::parse` maps a location path to a logical route; anything that does
 * not match resolves to `Route::NotFound`, a defined terminal state rather than
 * an error. `can_access` is the authorization decision, a pure function of the
 * route and the current session, so it can be tested without any rendering.
 */
use crate::core::AuthSession;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const LANDING_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Dashboard,
    TaskList,
    // `task_id` is opaque; it is passed through to the view unvalidated.
    TaskDetails { task_id: String },
    Reports,
    RecurringTaskSettings,
    Kanban,
    NotFound { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    // Navigate to the target instead, replacing the current history entry.
    Redirect(Route),
}

impl Route {
    pub fn parse(path: &str) -> Route {
        // Query strings and fragments do not take part in matching.
        let path_only = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path_only.trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Landing,
            ["login"] => Route::Login,
            ["dashboard"] => Route::Dashboard,
            ["tasks"] => Route::TaskList,
            ["tasks", task_id] => Route::TaskDetails {
                task_id: (*task_id).to_string(),
            },
            ["reports"] => Route::Reports,
            ["settings", "recurring"] => Route::RecurringTaskSettings,
            ["kanban"] => Route::Kanban,
            _ => Route::NotFound {
                path: path.to_string(),
            },
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Landing => LANDING_PATH.to_string(),
            Route::Login => LOGIN_PATH.to_string(),
            Route::Dashboard => DASHBOARD_PATH.to_string(),
            Route::TaskList => "/tasks".to_string(),
            Route::TaskDetails { task_id } => format!("/tasks/{task_id}"),
            Route::Reports => "/reports".to_string(),
            Route::RecurringTaskSettings => "/settings/recurring".to_string(),
            Route::Kanban => "/kanban".to_string(),
            Route::NotFound { path } => path.clone(),
        }
    }

    pub fn access(&self) -> RouteAccess {
        match self {
            Route::Landing | Route::Login | Route::NotFound { .. } => RouteAccess::Public,
            Route::Dashboard
            | Route::TaskList
            | Route::TaskDetails { .. }
            | Route::Reports
            | Route::RecurringTaskSettings
            | Route::Kanban => RouteAccess::Protected,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.access() == RouteAccess::Protected
    }
}

/*
 * Decides whether `route` may render for the given session. Only presence of
 * the session matters; the role is not consulted.
 */
pub fn can_access(route: &Route, session: Option<&AuthSession>) -> AccessDecision {
    match (route.access(), session) {
        (RouteAccess::Public, _) => AccessDecision::Allow,
        (RouteAccess::Protected, Some(_)) => AccessDecision::Allow,
        (RouteAccess::Protected, None) => AccessDecision::Redirect(Route::Login),
    }
}
