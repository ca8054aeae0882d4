/*
 * Executes `BackgroundJob`s off the event loop. Each job runs on its own worker
 * thread against the blocking core services and reports its completion by
 * sending exactly one `AppEvent` back to the event loop. Workers never touch the
 * application state; committing results is the event loop's business.
 */
use super::error::{PlatformError, Result as PlatformResult};
use super::types::{AppEvent, BackgroundJob};
use crate::core::{
    IdentityResolverOperations, RemoteFetchOperations, SessionHydrator, SessionStorageOperations,
};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

// The blocking services a job may use.
pub struct JobServices {
    pub storage: Arc<dyn SessionStorageOperations>,
    pub identity_resolver: Arc<dyn IdentityResolverOperations>,
    pub fetcher: Arc<dyn RemoteFetchOperations>,
}

pub struct JobRunner {
    services: Arc<JobServices>,
    events: Sender<AppEvent>,
}

impl JobRunner {
    pub fn new(services: JobServices, events: Sender<AppEvent>) -> Self {
        JobRunner {
            services: Arc::new(services),
            events,
        }
    }

    /*
     * Starts `job` on a worker thread. The completion event is delivered through
     * the runner's channel; if the event loop is gone by then, the result is
     * dropped.
     */
    pub fn spawn(&self, job: BackgroundJob) -> PlatformResult<()> {
        let services = Arc::clone(&self.services);
        let events = self.events.clone();
        let thread_name = match &job {
            BackgroundJob::HydrateSession => "hydrate-session".to_string(),
            BackgroundJob::FetchResource { ticket, .. } => {
                format!("fetch-{}-{}", ticket.key.name(), ticket.request_id)
            }
        };
        log::debug!("Platform: Starting background job '{thread_name}'.");
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let event = execute_job(&services, job);
                if events.send(event).is_err() {
                    log::debug!("Platform: Event loop gone; dropping job result.");
                }
            })
            .map(|_| ())
            .map_err(PlatformError::Io)
    }
}

// Runs `job` to completion on the calling thread and returns its completion event.
pub fn execute_job(services: &JobServices, job: BackgroundJob) -> AppEvent {
    match job {
        BackgroundJob::HydrateSession => {
            let hydrator = SessionHydrator::new(
                Arc::clone(&services.storage),
                Arc::clone(&services.identity_resolver),
            );
            AppEvent::HydrationFinished {
                outcome: hydrator.hydrate(),
            }
        }
        BackgroundJob::FetchResource { ticket, token } => AppEvent::ResourceFetched {
            ticket,
            result: services.fetcher.fetch(ticket.key, token.as_deref()),
        },
    }
}
