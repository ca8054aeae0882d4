/*
 * A line-oriented host for the application logic. It owns the event loop: user
 * input (read on its own thread) and background job completions both arrive on
 * one channel and are handed to the `PlatformEventHandler` one at a time. After
 * each event the host drains the handler's command queue and executes the
 * commands, printing views and notifications to its output.
 */
use super::error::{PlatformError, Result as PlatformResult};
use super::job_runner::{JobRunner, JobServices};
use super::types::{AppEvent, MessageSeverity, PlatformCommand, PlatformEventHandler, ViewKind};
use crate::core::{ResourceKey, Role};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

const BAR_SYMBOL: char = '#';
const MAX_BAR_WIDTH: u64 = 50;

pub const HELP_TEXT: &str = "Commands: open <path> | back | login <token> <user-id> <admin|member> | demo | logout | refresh [reports] | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Quit,
}

pub struct ConsoleHost<W: Write> {
    output: W,
    event_tx: Sender<AppEvent>,
    event_rx: Receiver<AppEvent>,
    job_runner: JobRunner,
    location: String,
}

impl<W: Write> ConsoleHost<W> {
    pub fn new(services: JobServices, output: W) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let job_runner = JobRunner::new(services, event_tx.clone());
        ConsoleHost {
            output,
            event_tx,
            event_rx,
            job_runner,
            location: String::new(),
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /*
     * Runs the event loop until the handler asks to quit. `input` is read on a
     * separate thread; reaching its end counts as a quit request.
     */
    pub fn run<R>(
        &mut self,
        input: R,
        event_handler: Arc<Mutex<dyn PlatformEventHandler>>,
        initial_path: &str,
    ) -> PlatformResult<()>
    where
        R: BufRead + Send + 'static,
    {
        let startup = AppEvent::Startup {
            initial_path: initial_path.to_string(),
        };
        let mut control = self.dispatch(&event_handler, startup)?;
        if control == LoopControl::Continue {
            spawn_input_reader(input, self.event_tx.clone())?;
        }

        while control == LoopControl::Continue {
            // The host keeps its own sender, so the channel cannot disconnect here.
            let event = self
                .event_rx
                .recv()
                .map_err(|_| PlatformError::ChannelClosed)?;
            control = self.dispatch(&event_handler, event)?;
        }

        event_handler
            .lock()
            .map_err(|_| PlatformError::HandlerUnavailable)?
            .on_quit();
        log::info!("Platform: Event loop exited cleanly.");
        Ok(())
    }

    // Delivers one event and executes every command it produced.
    fn dispatch(
        &mut self,
        event_handler: &Arc<Mutex<dyn PlatformEventHandler>>,
        event: AppEvent,
    ) -> PlatformResult<LoopControl> {
        let commands = {
            let mut handler_guard = event_handler
                .lock()
                .map_err(|_| PlatformError::HandlerUnavailable)?;
            handler_guard.handle_event(event);
            let mut commands = Vec::new();
            while let Some(command) = handler_guard.try_dequeue_command() {
                commands.push(command);
            }
            commands
        };

        let mut control = LoopControl::Continue;
        for command in commands {
            if self.execute_command(command)? == LoopControl::Quit {
                control = LoopControl::Quit;
            }
        }
        Ok(control)
    }

    fn execute_command(&mut self, command: PlatformCommand) -> PlatformResult<LoopControl> {
        log::trace!("Platform: Executing {command:?}");
        match command {
            PlatformCommand::RenderView { view } => {
                writeln!(self.output, "{}", describe_view(&view))?;
            }
            PlatformCommand::PushLocation { path } => {
                writeln!(self.output, "[location] {path}")?;
                self.location = path;
            }
            PlatformCommand::ReplaceLocation { path } => {
                writeln!(self.output, "[location] {path} (replaced {})", self.location)?;
                self.location = path;
            }
            PlatformCommand::SetNavigationChrome { authenticated } => {
                let chrome = if authenticated {
                    "sidebar: Dashboard | Tasks | Kanban | Reports | Recurring | Logout"
                } else {
                    "sidebar hidden"
                };
                writeln!(self.output, "[chrome] {chrome}")?;
            }
            PlatformCommand::ShowNotification { severity, text } => {
                let label = match severity {
                    MessageSeverity::Warning => "warning",
                    MessageSeverity::Error => "error",
                };
                writeln!(self.output, "[{label}] {text}")?;
            }
            PlatformCommand::StartJob { job } => self.job_runner.spawn(job)?,
            PlatformCommand::QuitApplication => return Ok(LoopControl::Quit),
        }
        self.output.flush()?;
        Ok(LoopControl::Continue)
    }
}

fn spawn_input_reader<R>(input: R, events: Sender<AppEvent>) -> PlatformResult<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("Platform: Failed to read input: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_console_input(&line) {
                    Some(event) => {
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    None => eprintln!("Unrecognized input '{}'. {HELP_TEXT}", line.trim()),
                }
            }
            let _ = events.send(AppEvent::QuitRequested);
        })
        .map(|_| ())
        .map_err(PlatformError::Io)
}

// Maps one line of user input to an event. A bare path is shorthand for `open`.
pub fn parse_console_input(line: &str) -> Option<AppEvent> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    if command.starts_with('/') {
        return Some(AppEvent::NavigationRequested {
            path: command.to_string(),
        });
    }
    let event = match (command.to_ascii_lowercase().as_str(), words.next()) {
        ("open" | "go", Some(path)) => AppEvent::NavigationRequested {
            path: path.to_string(),
        },
        ("back", None) => AppEvent::BackRequested,
        ("login", Some(token)) => {
            let user_id = words.next()?;
            let role = words.next()?.parse::<Role>().ok()?;
            AppEvent::LoginSubmitted {
                token: token.to_string(),
                user_id: user_id.to_string(),
                role,
            }
        }
        ("demo", None) => AppEvent::DemoLoginClicked,
        ("logout", None) => AppEvent::LogoutClicked,
        ("refresh", None) => AppEvent::RefreshRequested {
            key: ResourceKey::Reports,
        },
        ("refresh", Some(name)) => AppEvent::RefreshRequested {
            key: ResourceKey::from_name(name)?,
        },
        ("quit" | "exit", None) => AppEvent::QuitRequested,
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(event)
}

// Bars are drawn one symbol per task until the largest count no longer fits, then scaled to it.
fn bar_length(tasks: u32, largest: u64) -> usize {
    let tasks = u64::from(tasks);
    let length = if largest <= MAX_BAR_WIDTH {
        tasks
    } else {
        tasks * MAX_BAR_WIDTH / largest
    };
    length as usize
}

pub fn describe_view(view: &ViewKind) -> String {
    match view {
        ViewKind::Loading => "Loading...".to_string(),
        ViewKind::Landing => "== Task Manager ==\nPlan, track and review your team's work.".to_string(),
        ViewKind::Login => "== Login ==\nUse 'login <token> <user-id> <role>' or 'demo'.".to_string(),
        ViewKind::Dashboard => "== Dashboard ==".to_string(),
        ViewKind::TaskList => "== Tasks ==".to_string(),
        ViewKind::TaskDetails { task_id } => format!("== Task {task_id} =="),
        ViewKind::Reports { entries } => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            let largest = entries.iter().map(|e| u64::from(e.tasks)).max().unwrap_or(0);
            let mut text = "== Reports: tasks completed ==".to_string();
            for entry in entries {
                let bar: String =
                    std::iter::repeat_n(BAR_SYMBOL, bar_length(entry.tasks, largest)).collect();
                text.push_str(&format!("\n{:<width$} | {bar} {}", entry.name, entry.tasks));
            }
            text
        }
        ViewKind::RecurringTaskSettings => "== Recurring Task Settings ==".to_string(),
        ViewKind::Kanban => "== Kanban Board ==".to_string(),
        ViewKind::NotFound { path } => format!("== Not Found ==\nNothing lives at '{path}'."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remote_api::{ResolvedIdentity, Result as FetchResult};
    use crate::core::session_storage::Result as StorageResult;
    use crate::core::{
        FetchError, IdentityResolverOperations, RemoteFetchOperations, ReportEntry,
        SessionStorageOperations,
    };
    use std::io::Cursor;

    struct NullStorage;

    impl SessionStorageOperations for NullStorage {
        fn get_item(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }
        fn set_item(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Ok(())
        }
        fn remove_item(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    struct OfflineRemote;

    impl RemoteFetchOperations for OfflineRemote {
        fn fetch(&self, _key: ResourceKey, _token: Option<&str>) -> FetchResult<serde_json::Value> {
            Err(FetchError::Transport("offline".to_string()))
        }
    }

    impl IdentityResolverOperations for OfflineRemote {
        fn resolve_identity(&self, _token: &str) -> FetchResult<ResolvedIdentity> {
            Err(FetchError::Transport("offline".to_string()))
        }
    }

    fn offline_services() -> JobServices {
        JobServices {
            storage: Arc::new(NullStorage),
            identity_resolver: Arc::new(OfflineRemote),
            fetcher: Arc::new(OfflineRemote),
        }
    }

    // Records events; renders the landing view on startup and quits on request.
    struct MockEventHandler {
        events: Arc<Mutex<Vec<AppEvent>>>,
        commands: Vec<PlatformCommand>,
        quit_called: Arc<Mutex<bool>>,
    }

    impl PlatformEventHandler for MockEventHandler {
        fn handle_event(&mut self, event: AppEvent) {
            match &event {
                AppEvent::Startup { .. } => self.commands.push(PlatformCommand::RenderView {
                    view: ViewKind::Landing,
                }),
                AppEvent::QuitRequested => self.commands.push(PlatformCommand::QuitApplication),
                _ => {}
            }
            self.events.lock().unwrap().push(event);
        }
        fn on_quit(&mut self) {
            *self.quit_called.lock().unwrap() = true;
        }
        fn try_dequeue_command(&mut self) -> Option<PlatformCommand> {
            if self.commands.is_empty() {
                None
            } else {
                Some(self.commands.remove(0))
            }
        }
    }

    #[test]
    fn test_parse_console_input() {
        assert_eq!(
            parse_console_input("open /tasks/7"),
            Some(AppEvent::NavigationRequested {
                path: "/tasks/7".to_string()
            })
        );
        assert_eq!(
            parse_console_input("/reports"),
            Some(AppEvent::NavigationRequested {
                path: "/reports".to_string()
            })
        );
        assert_eq!(
            parse_console_input("login abc123 user7 member"),
            Some(AppEvent::LoginSubmitted {
                token: "abc123".to_string(),
                user_id: "user7".to_string(),
                role: Role::Member
            })
        );
        assert_eq!(parse_console_input("  demo "), Some(AppEvent::DemoLoginClicked));
        assert_eq!(
            parse_console_input("refresh reports"),
            Some(AppEvent::RefreshRequested {
                key: ResourceKey::Reports
            })
        );
        assert_eq!(parse_console_input("QUIT"), Some(AppEvent::QuitRequested));
    }

    #[test]
    fn test_parse_console_input_rejects_malformed_lines() {
        assert_eq!(parse_console_input("open"), None);
        assert_eq!(parse_console_input("login abc123 user7"), None);
        assert_eq!(parse_console_input("login abc123 user7 owner"), None);
        assert_eq!(parse_console_input("refresh tasks"), None);
        assert_eq!(parse_console_input("back now"), None);
        assert_eq!(parse_console_input("dance"), None);
    }

    #[test]
    fn test_describe_reports_view_draws_bars() {
        let text = describe_view(&ViewKind::Reports {
            entries: vec![ReportEntry::new("This Week", 3), ReportEntry::new("Older", 0)],
        });

        assert!(text.contains("This Week | ### 3"));
        assert!(text.contains("Older     |  0"));
    }

    #[test]
    fn test_describe_reports_view_scales_large_counts() {
        let text = describe_view(&ViewKind::Reports {
            entries: vec![
                ReportEntry::new("Huge", u32::MAX),
                ReportEntry::new("Half", u32::MAX / 2),
                ReportEntry::new("Tiny", 1),
            ],
        });

        let bar_of = |name: &str| {
            let line = text.lines().find(|l| l.starts_with(name)).unwrap();
            line.chars().filter(|c| *c == BAR_SYMBOL).count()
        };
        assert_eq!(bar_of("Huge"), 50);
        assert_eq!(bar_of("Half"), 24);
        assert_eq!(bar_of("Tiny"), 0);
        assert!(text.contains("Huge | ################################################## 4294967295"));
    }

    #[test]
    fn test_run_dispatches_input_until_quit() {
        // Arrange
        crate::initialize_logging();
        let events = Arc::new(Mutex::new(Vec::new()));
        let quit_called = Arc::new(Mutex::new(false));
        let handler = Arc::new(Mutex::new(MockEventHandler {
            events: Arc::clone(&events),
            commands: Vec::new(),
            quit_called: Arc::clone(&quit_called),
        }));
        let mut host = ConsoleHost::new(offline_services(), Vec::new());
        let input = Cursor::new("open /login\nnonsense\nquit\n".as_bytes().to_vec());

        // Act
        let result = host.run(input, handler, "/");

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                AppEvent::Startup {
                    initial_path: "/".to_string()
                },
                AppEvent::NavigationRequested {
                    path: "/login".to_string()
                },
                AppEvent::QuitRequested,
            ]
        );
        assert!(*quit_called.lock().unwrap());
        let output = String::from_utf8(host.output().clone()).unwrap();
        assert!(output.contains("== Task Manager =="));
    }
}
