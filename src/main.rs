mod app_logic;
mod core;
mod platform_layer;

use crate::app_logic::TaskManagerAppLogic;
use crate::core::{
    AppStateContainer, CoreConfigManager, CoreSessionStorage, HttpApiClient,
    IdentityResolverOperations, RemoteDataCache, RemoteFetchOperations, SessionStorageOperations,
    load_config_or_defaults,
};
use crate::platform_layer::console_host::HELP_TEXT;
use crate::platform_layer::error::PlatformError;
use crate::platform_layer::{ConsoleHost, JobServices, PlatformEventHandler, PlatformResult};

use simplelog::{ConfigBuilder, LevelFilter};
use std::io::{self, BufReader};
use std::sync::{Arc, Mutex, Once};

pub(crate) const APP_NAME: &str = "TaskManagerClient";

static LOGGING_INIT: Once = Once::new();

/*
 * Installs the global logger exactly once. Tests get `TestLogger`, which writes
 * through the test harness so output is captured per test; the binary logs to
 * stderr, keeping stdout for the console views.
 */
pub(crate) fn initialize_logging() {
    LOGGING_INIT.call_once(|| {
        let config = ConfigBuilder::new()
            .set_thread_level(LevelFilter::Off)
            .set_target_level(LevelFilter::Off)
            .build();

        #[cfg(test)]
        let result = simplelog::TestLogger::init(LevelFilter::Debug, config);
        #[cfg(not(test))]
        let result = simplelog::TermLogger::init(
            LevelFilter::Info,
            config,
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        );

        if let Err(e) = result {
            eprintln!("Failed to initialize logger: {e}");
        }
    });
}

fn main() -> PlatformResult<()> {
    initialize_logging();
    log::info!("Application: Starting {APP_NAME}.");

    let config = load_config_or_defaults(&CoreConfigManager::new(), APP_NAME);
    log::info!("Application: Using API at {}.", config.api_base_url);

    let api_client = Arc::new(
        HttpApiClient::new(&config)
            .map_err(|e| PlatformError::InitializationFailed(e.to_string()))?,
    );
    let storage: Arc<dyn SessionStorageOperations> =
        Arc::new(CoreSessionStorage::for_app(APP_NAME));

    let container = AppStateContainer::create(Arc::clone(&storage));
    let app_logic = TaskManagerAppLogic::new(
        Arc::clone(&container),
        RemoteDataCache::new(config.stale_after()),
    );
    let event_handler: Arc<Mutex<dyn PlatformEventHandler>> = Arc::new(Mutex::new(app_logic));

    let services = JobServices {
        storage,
        identity_resolver: Arc::clone(&api_client) as Arc<dyn IdentityResolverOperations>,
        fetcher: api_client as Arc<dyn RemoteFetchOperations>,
    };
    let mut host = ConsoleHost::new(services, io::stdout());

    let initial_path = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());
    println!("{HELP_TEXT}");
    let run_result = host.run(BufReader::new(io::stdin()), event_handler, &initial_path);

    container.dispose();
    log::info!("Application: Exited.");
    run_result
}
