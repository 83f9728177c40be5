use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::debug;

const KEYRING_SERVICE: &str = "mande";
const KEYRING_ACCOUNT: &str = "gemini";
const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where the API key in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Env(&'static str),
    Keyring,
}

impl fmt::Display for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeySource::Env(var) => write!(f, "environment variable {var}"),
            ApiKeySource::Keyring => write!(f, "system keyring"),
        }
    }
}

fn entry() -> Result<Entry, KeyringAccessError> {
    Ok(Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?)
}

pub fn store_api_key(key: &str) -> Result<(), KeyringAccessError> {
    entry()?.set_password(key)?;
    Ok(())
}

pub fn get_api_key() -> Result<Option<String>, KeyringAccessError> {
    match entry()?.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Returns whether a stored key was removed.
pub fn delete_api_key() -> Result<bool, KeyringAccessError> {
    match entry()?.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Environment variables first, then the keyring.
pub fn resolve_api_key() -> Result<Option<(String, ApiKeySource)>, KeyringAccessError> {
    resolve_api_key_with(|var| std::env::var(var).ok(), get_api_key)
}

fn resolve_api_key_with(
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Result<Option<String>, KeyringAccessError>,
) -> Result<Option<(String, ApiKeySource)>, KeyringAccessError> {
    for var in API_KEY_ENV_VARS {
        if let Some(key) = env(var).filter(|key| !key.trim().is_empty()) {
            debug!(source = var, "using API key from environment");
            return Ok(Some((key.trim().to_string(), ApiKeySource::Env(var))));
        }
    }
    Ok(keyring()?.map(|key| (key, ApiKeySource::Keyring)))
}
