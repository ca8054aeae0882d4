/*
 * This module defines the data types exchanged between the application logic
 * and the host that embeds it (a browser shell, or the console host shipped
 * with this binary). It includes descriptions of the views the host renders
 * (`ViewKind`), platform-agnostic event types (`AppEvent`), commands for the
 * host (`PlatformCommand`), background jobs the host runs off the event loop
 * (`BackgroundJob`), and the `PlatformEventHandler` trait that the application
 * logic implements.
 */

use crate::core::{FetchError, FetchTicket, HydrationOutcome, ReportEntry, ResourceKey, Role};

// --- Data Structures for UI Description (Platform-Agnostic) ---

/*
 * Describes which view the host should show, together with the data the view
 * needs. The host owns the presentation; the application logic only decides
 * what is shown.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    // Neutral placeholder shown while the session is being restored.
    Loading,
    Landing,
    Login,
    Dashboard,
    TaskList,
    TaskDetails { task_id: String },
    Reports { entries: Vec<ReportEntry> },
    RecurringTaskSettings,
    Kanban,
    NotFound { path: String },
}

// Ordered from least to most severe for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageSeverity {
    Warning,
    Error,
}

/*
 * I/O the application logic asks the host to perform off the event loop. The
 * host reports each job's completion back as an `AppEvent`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundJob {
    // Read the persisted token and resolve its identity. Completes with `HydrationFinished`.
    HydrateSession,
    // Fetch a remote resource. Completes with `ResourceFetched` carrying the same ticket.
    FetchResource {
        ticket: FetchTicket,
        token: Option<String>,
    },
}

// --- Events from Host to App Logic ---

/*
 * Represents platform-agnostic events delivered to the application logic.
 * User interactions arrive from the host's input handling; job completions
 * arrive from the host's workers, but are always delivered on the event loop.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // The host is ready; `initial_path` is the location the client was opened at.
    Startup {
        initial_path: String,
    },
    NavigationRequested {
        path: String,
    },
    BackRequested,
    LoginSubmitted {
        token: String,
        user_id: String,
        role: Role,
    },
    // The "Demo Login" button on the login view.
    DemoLoginClicked,
    LogoutClicked,
    RefreshRequested {
        key: ResourceKey,
    },
    HydrationFinished {
        outcome: HydrationOutcome,
    },
    ResourceFetched {
        ticket: FetchTicket,
        result: Result<serde_json::Value, FetchError>,
    },
    QuitRequested,
}

// --- Commands from App Logic to Host ---

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCommand {
    RenderView {
        view: ViewKind,
    },
    // Adds a new history entry for `path`.
    PushLocation {
        path: String,
    },
    // Replaces the current history entry; used for redirects.
    ReplaceLocation {
        path: String,
    },
    // Shows or hides the authenticated chrome (sidebar and logout button).
    SetNavigationChrome {
        authenticated: bool,
    },
    ShowNotification {
        severity: MessageSeverity,
        text: String,
    },
    StartJob {
        job: BackgroundJob,
    },
    QuitApplication,
}

// --- Trait for App Logic to Handle Events ---

// A trait to be implemented by the application logic layer to handle host events.
pub trait PlatformEventHandler: Send + Sync + 'static {
    // Called by the host for every event, one at a time, on the event loop.
    // The implementor should handle the event and enqueue `PlatformCommand`s.
    fn handle_event(&mut self, event: AppEvent);

    // Called by the host when it is about to leave its main loop.
    fn on_quit(&mut self) {}

    // Attempts to dequeue a single `PlatformCommand` from the internal queue.
    fn try_dequeue_command(&mut self) -> Option<PlatformCommand>;
}
