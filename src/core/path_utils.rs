/*
 * Resolves the per-user directory where the client keeps its durable files
 * (the local storage file holding the session token and the optional
 * `config.json`). Both the storage and the configuration manager go through
 * here so that they always agree on the location.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/*
 * Retrieves the application's local (non-roaming) configuration directory,
 * creating it if necessary.
 *
 * Returns `None` if the platform has no suitable location or the directory
 * could not be created. Callers treat that as "storage unavailable".
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving local config dir for '{app_name}'");
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    let config_path = proj_dirs.config_local_dir();
    if !config_path.exists() {
        if let Err(e) = fs::create_dir_all(config_path) {
            log::error!("PathUtils: Failed to create local config dir {config_path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created local config dir {config_path:?}");
    }
    Some(config_path.to_path_buf())
}
