//! Process-wide logger accessor.
//!
//! Installed once at startup. Libraries that cannot have a logger passed in
//! call [`logger`] (or [`try_logger`] when running without one is fine).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::logger::Logger;

static GLOBAL: RwLock<Option<Arc<dyn Logger>>> = parking_lot::const_rwlock(None);

/// Installs `logger` as the process-wide logger.
///
/// # Errors
///
/// [`ConfigError::AlreadyInstalled`] if a logger is already installed.
pub fn install(logger: Arc<dyn Logger>) -> Result<(), ConfigError> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(ConfigError::AlreadyInstalled);
    }
    *slot = Some(logger);
    Ok(())
}

/// The installed logger.
///
/// # Panics
///
/// Panics if called before [`install`]; using the accessor before startup
/// has finished is a programming error.
#[must_use]
pub fn logger() -> Arc<dyn Logger> {
    match try_logger() {
        Some(logger) => logger,
        None => panic!("global logger used before logweave_server::global::install"),
    }
}

#[must_use]
pub fn try_logger() -> Option<Arc<dyn Logger>> {
    GLOBAL.read().clone()
}

/// Removes and returns the installed logger, typically to close it at
/// shutdown.
pub fn uninstall() -> Option<Arc<dyn Logger>> {
    GLOBAL.write().take()
}
