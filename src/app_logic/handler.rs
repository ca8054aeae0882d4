use super::navigation_state::{HydrationPhase, NavigationState};
use super::reports_view;
use super::router::{AccessDecision, Route, can_access};
use crate::core::{
    AppState, AppStateContainer, CacheLookup, FetchCommit, FetchError, FetchTicket,
    HydrationOutcome, LoginOutcome, RemoteDataCache, ResourceKey, Role, StatePatch, Subscription,
    apply_hydration_outcome,
};
use crate::platform_layer::{
    AppEvent, BackgroundJob, MessageSeverity, PlatformCommand, PlatformEventHandler, ViewKind,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

// Credentials used by the "Demo Login" button.
pub(crate) const DEMO_TOKEN: &str = "demo-token";
pub(crate) const DEMO_USER_ID: &str = "user123";
pub(crate) const DEMO_ROLE: Role = Role::Admin;

type Clock = Box<dyn Fn() -> OffsetDateTime + Send + Sync>;

/*
 * The presenter of the client. It receives host events one at a time on the
 * event loop, drives the state container and the remote data cache, applies the
 * route guard, and enqueues `PlatformCommand`s for the host.
 *
 * Startup hydration gates the guard: until `HydrationFinished` arrives, any
 * protected navigation renders `ViewKind::Loading` and is remembered, so no
 * protected view is ever shown for a session that has not been restored yet.
 *
 * The presenter subscribes to the container and reconciles the host with each
 * committed state change after handling an event: it toggles the
 * authenticated chrome, re-runs the guard when the session disappears under a
 * protected view, and re-renders the reports view when new data arrives.
 */
pub struct TaskManagerAppLogic {
    container: Arc<AppStateContainer>,
    cache: RemoteDataCache,
    navigation: NavigationState,
    commands: VecDeque<PlatformCommand>,
    // Most recent snapshot delivered by the container subscription, not yet reconciled.
    latest_notified: Arc<Mutex<Option<AppState>>>,
    subscription: Option<Subscription>,
    last_rendered_view: Option<ViewKind>,
    // Set when the user logs in or out before hydration resolves; the hydration result is then stale.
    session_action_before_hydration: bool,
    now: Clock,
}

impl TaskManagerAppLogic {
    pub fn new(container: Arc<AppStateContainer>, cache: RemoteDataCache) -> Self {
        Self::with_clock(container, cache, Box::new(OffsetDateTime::now_utc))
    }

    pub fn with_clock(
        container: Arc<AppStateContainer>,
        cache: RemoteDataCache,
        now: Clock,
    ) -> Self {
        let latest_notified = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&latest_notified);
        let subscription = container.subscribe(move |state: &AppState| {
            *sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(state.clone());
        });
        TaskManagerAppLogic {
            container,
            cache,
            navigation: NavigationState::new(),
            commands: VecDeque::new(),
            latest_notified,
            subscription: Some(subscription),
            last_rendered_view: None,
            session_action_before_hydration: false,
            now,
        }
    }

    #[cfg(test)]
    pub(crate) fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &RemoteDataCache {
        &self.cache
    }

    fn enqueue(&mut self, command: PlatformCommand) {
        self.commands.push_back(command);
    }

    fn render(&mut self, view: ViewKind) {
        self.last_rendered_view = Some(view.clone());
        self.enqueue(PlatformCommand::RenderView { view });
    }

    fn notify_user(&mut self, severity: MessageSeverity, text: String) {
        self.enqueue(PlatformCommand::ShowNotification { severity, text });
    }

    fn on_startup(&mut self, initial_path: &str) {
        let route = Route::parse(initial_path);
        log::info!("AppLogic: Starting at '{}'.", route.path());
        self.navigation.push(route);
        self.navigation.hydration_phase = HydrationPhase::Pending;
        self.enqueue(PlatformCommand::StartJob {
            job: BackgroundJob::HydrateSession,
        });
        self.show_current_route();
    }

    fn navigate_to(&mut self, route: Route) {
        let path = route.path();
        log::debug!("AppLogic: Navigating to '{path}'.");
        self.navigation.push(route);
        self.enqueue(PlatformCommand::PushLocation { path });
        self.show_current_route();
    }

    /*
     * Runs the guard for the current location and renders the outcome. While
     * hydration is pending a protected location is deferred behind the loading
     * view; a public location renders right away and cancels any deferral.
     */
    fn show_current_route(&mut self) {
        let Some(route) = self.navigation.current_route().cloned() else {
            return;
        };

        if route.is_protected() && !self.navigation.is_hydrated() {
            log::debug!(
                "AppLogic: Deferring '{}' until the session is restored.",
                route.path()
            );
            self.navigation.deferred_navigation = Some(route);
            self.navigation.rendered_route = None;
            self.render(ViewKind::Loading);
            return;
        }
        if !route.is_protected() {
            self.navigation.deferred_navigation = None;
        }

        let state = self.container.get_state();
        match can_access(&route, state.auth.as_ref()) {
            AccessDecision::Allow => self.render_route(route, &state),
            AccessDecision::Redirect(target) => {
                // Expected for signed-out users; not an error.
                log::debug!(
                    "AppLogic: '{}' requires a session, redirecting to '{}'.",
                    route.path(),
                    target.path()
                );
                self.navigation.replace_current(target.clone());
                self.enqueue(PlatformCommand::ReplaceLocation {
                    path: target.path(),
                });
                let state = self.container.get_state();
                match can_access(&target, state.auth.as_ref()) {
                    AccessDecision::Allow => self.render_route(target, &state),
                    AccessDecision::Redirect(_) => {
                        log::error!("AppLogic: Redirect target '{}' is itself guarded.", target.path());
                    }
                }
            }
        }
    }

    fn render_route(&mut self, route: Route, state: &AppState) {
        let view = match &route {
            Route::Landing => ViewKind::Landing,
            Route::Login => ViewKind::Login,
            Route::Dashboard => ViewKind::Dashboard,
            Route::TaskList => ViewKind::TaskList,
            Route::TaskDetails { task_id } => ViewKind::TaskDetails {
                task_id: task_id.clone(),
            },
            Route::Reports => ViewKind::Reports {
                entries: reports_view::chart_entries(state),
            },
            Route::RecurringTaskSettings => ViewKind::RecurringTaskSettings,
            Route::Kanban => ViewKind::Kanban,
            Route::NotFound { path } => ViewKind::NotFound { path: path.clone() },
        };
        let wants_reports = route == Route::Reports;
        self.navigation.rendered_route = Some(route);
        self.render(view);
        if wants_reports {
            self.request_resource(ResourceKey::Reports);
        }
    }

    fn current_token(&self) -> Option<String> {
        self.container
            .get_state()
            .auth
            .map(|session| session.token().to_string())
    }

    fn start_fetch(&mut self, ticket: FetchTicket) {
        let token = self.current_token();
        self.enqueue(PlatformCommand::StartJob {
            job: BackgroundJob::FetchResource { ticket, token },
        });
    }

    fn request_resource(&mut self, key: ResourceKey) {
        let now = (self.now)();
        match self.cache.request(key, now) {
            CacheLookup::Fresh(payload) => self.project_payload(key, payload),
            CacheLookup::InFlight(ticket) => {
                log::trace!(
                    "AppLogic: '{}' already requested ({}).",
                    key.name(),
                    ticket.request_id
                );
            }
            CacheLookup::Fetch(ticket) => self.start_fetch(ticket),
        }
    }

    fn refresh_resource(&mut self, key: ResourceKey) {
        let ticket = self.cache.refetch(key);
        self.start_fetch(ticket);
    }

    // Writes a cache payload into the container unless the projection already matches.
    fn project_payload(&mut self, key: ResourceKey, payload: serde_json::Value) {
        match key {
            ResourceKey::Reports => match reports_view::decode_reports(payload) {
                Ok(reports) => {
                    if self.container.get_state().reports.as_ref() != Some(&reports) {
                        self.commit_patch(StatePatch::new().reports(Some(reports)));
                    }
                }
                Err(e) => log::warn!("AppLogic: Cached reports could not be decoded: {e}"),
            },
        }
    }

    fn commit_patch(&mut self, patch: StatePatch) {
        if let Err(e) = self.container.set_state(patch) {
            log::error!("AppLogic: State update rejected: {e}");
        }
    }

    fn on_resource_fetched(
        &mut self,
        ticket: FetchTicket,
        result: Result<serde_json::Value, FetchError>,
    ) {
        // Validate the payload shape before it may become the cached entry.
        let checked = result.and_then(|payload| match ticket.key {
            ResourceKey::Reports => reports_view::decode_reports(payload.clone()).map(|_| payload),
        });
        let now = (self.now)();
        match self.cache.complete(ticket, checked, now) {
            FetchCommit::Committed(payload) => self.project_payload(ticket.key, payload),
            FetchCommit::Superseded => {}
            FetchCommit::Failed(e) => {
                log::warn!("AppLogic: Keeping previous '{}' data: {e}", ticket.key.name());
                self.notify_user(
                    MessageSeverity::Warning,
                    format!("Could not load {}: {e}", ticket.key.name()),
                );
            }
        }
    }

    fn on_hydration_finished(&mut self, outcome: HydrationOutcome) {
        if self.navigation.is_hydrated() {
            log::warn!("AppLogic: Ignoring repeated hydration result {outcome:?}.");
            return;
        }
        if self.session_action_before_hydration {
            // The user logged in or out while hydration was running; that decision stands.
            log::info!("AppLogic: Session changed during hydration; result {outcome:?} not applied.");
        } else if let Err(e) = apply_hydration_outcome(&self.container, &outcome) {
            log::error!("AppLogic: Could not apply hydration result: {e}");
        }
        self.navigation.hydration_phase = HydrationPhase::Resolved;
        log::debug!("AppLogic: Hydration resolved.");

        if self.navigation.deferred_navigation.take().is_some() {
            self.show_current_route();
        }
    }

    fn record_session_action(&mut self) {
        if !self.navigation.is_hydrated() {
            self.session_action_before_hydration = true;
        }
    }

    /*
     * A new session never sees data fetched for the previous one: the container
     * drops the reports projection and the cache is emptied, which also
     * supersedes fetches still carrying the old token.
     */
    fn on_login(&mut self, token: &str, user_id: &str, role: Role) {
        let outcome = self.container.login(token, user_id, role);
        if outcome.is_ok() {
            self.record_session_action();
            self.cache.clear();
        }
        match outcome {
            Ok(LoginOutcome::Persisted) => {}
            Ok(LoginOutcome::MemoryOnly) => self.notify_user(
                MessageSeverity::Warning,
                "Signed in, but the session could not be saved and will end when the app closes."
                    .to_string(),
            ),
            Err(e) => {
                log::warn!("AppLogic: Login rejected: {e}");
                self.notify_user(MessageSeverity::Error, format!("Login failed: {e}"));
                return;
            }
        }
        self.navigate_to(Route::Dashboard);
    }

    fn on_logout(&mut self) {
        if let Err(e) = self.container.logout() {
            log::error!("AppLogic: Logout failed: {e}");
        }
        self.record_session_action();
        self.cache.clear();
        self.navigate_to(Route::Landing);
    }

    fn on_back(&mut self) {
        if self.navigation.go_back().is_some() {
            self.show_current_route();
        } else {
            log::debug!("AppLogic: No earlier history entry.");
        }
    }

    /*
     * Reconciles the host with the latest committed state: chrome visibility,
     * the guard for the view on screen, and the reports dataset.
     */
    fn sync_with_state(&mut self) {
        let latest = self
            .latest_notified
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(state) = latest else {
            return;
        };

        if state.is_authenticated() != self.navigation.chrome_authenticated {
            self.navigation.chrome_authenticated = state.is_authenticated();
            self.enqueue(PlatformCommand::SetNavigationChrome {
                authenticated: state.is_authenticated(),
            });
        }

        match self.navigation.rendered_route.clone() {
            Some(route) if route.is_protected() && !state.is_authenticated() => {
                self.show_current_route();
            }
            Some(Route::Reports) => {
                let view = ViewKind::Reports {
                    entries: reports_view::chart_entries(&state),
                };
                if self.last_rendered_view.as_ref() != Some(&view) {
                    self.render(view);
                }
            }
            _ => {}
        }
    }
}

impl PlatformEventHandler for TaskManagerAppLogic {
    fn handle_event(&mut self, event: AppEvent) {
        log::trace!("AppLogic: handle_event {event:?}");
        match event {
            AppEvent::Startup { initial_path } => self.on_startup(&initial_path),
            AppEvent::NavigationRequested { path } => self.navigate_to(Route::parse(&path)),
            AppEvent::BackRequested => self.on_back(),
            AppEvent::LoginSubmitted {
                token,
                user_id,
                role,
            } => self.on_login(&token, &user_id, role),
            AppEvent::DemoLoginClicked => self.on_login(DEMO_TOKEN, DEMO_USER_ID, DEMO_ROLE),
            AppEvent::LogoutClicked => self.on_logout(),
            AppEvent::RefreshRequested { key } => self.refresh_resource(key),
            AppEvent::HydrationFinished { outcome } => self.on_hydration_finished(outcome),
            AppEvent::ResourceFetched { ticket, result } => {
                self.on_resource_fetched(ticket, result)
            }
            AppEvent::QuitRequested => self.enqueue(PlatformCommand::QuitApplication),
        }
        self.sync_with_state();
    }

    fn on_quit(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        log::debug!("AppLogic: on_quit, unsubscribed from state container.");
    }

    fn try_dequeue_command(&mut self) -> Option<PlatformCommand> {
        self.commands.pop_front()
    }
}
