//! Host environment utility functions

use std::path::PathBuf;

/// Name of the environment variable giving the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "TARVOS_SW_ROOT";

/// Get the software root directory from the environment.
///
/// The root is where the `params` and `sessions` directories live. If the
/// environment variable is not set the current working directory is not
/// assumed, an `Err` is returned instead so the caller can report it.
pub fn get_sw_root() -> Result<PathBuf, ()> {
    match std::env::var(SW_ROOT_ENV_VAR) {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => Err(()),
    }
}
