//! Keyring helpers for the login password.

use keyring::Entry;
use log::debug;

use crate::config::ClientConfig;
use crate::error::{CslError, Result};

const SERVICE_NAME: &str = "amqcsl.session";

fn keyring_error(action: &str, err: keyring::Error) -> CslError {
    let hint = match err {
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
            " (is a Secret Service provider such as gnome-keyring running?)"
        }
        _ => "",
    };
    CslError::Keyring(format!("failed to {action}: {err}{hint}"))
}

fn password_entry(username: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, username).map_err(|err| keyring_error("create keyring entry", err))
}

/// Saves the password for `username` into the OS keyring.
pub fn store_password(username: &str, password: &str) -> Result<()> {
    password_entry(username)?
        .set_password(password)
        .map_err(|err| keyring_error("set keyring password", err))
}

/// Loads the password for `username`, `None` when nothing is stored.
pub fn load_password(username: &str) -> Result<Option<String>> {
    match password_entry(username)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(keyring_error("get keyring password", err)),
    }
}

/// Fills `config.password` from the keyring unless the config already has one.
pub fn resolve_password(config: &mut ClientConfig) -> Result<()> {
    if config.password.is_some() {
        return Ok(());
    }
    let Some(username) = config.username.as_deref() else {
        return Ok(());
    };
    config.password = load_password(username)?;
    debug!(
        "Keyring password for {}: {}",
        username,
        if config.password.is_some() { "found" } else { "missing" }
    );
    Ok(())
}
