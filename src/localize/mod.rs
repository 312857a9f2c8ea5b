//! Message-key resolution for public error bodies.
//!
//! Errors carry a message key, not rendered text. The text is looked up at
//! serialization time through a [`Localize`] implementation handed in by the
//! caller.

mod catalog;

use std::collections::{BTreeMap, HashMap};

pub use catalog::MessageCatalog;

#[derive(Debug, thiserror::Error)]
pub enum LocalizeError {
    #[error("no localized message for key '{0}'")]
    MissingKey(String),
    #[error("failed to read message catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid message catalog: {0}")]
    Catalog(#[from] serde_json::Error),
}

/// Resolves a message key to user-facing text.
pub trait Localize {
    fn localize(&self, key: &str) -> Result<String, LocalizeError>;
}

impl<F> Localize for F
where
    F: Fn(&str) -> Result<String, LocalizeError>,
{
    fn localize(&self, key: &str) -> Result<String, LocalizeError> {
        self(key)
    }
}

impl Localize for HashMap<String, String> {
    fn localize(&self, key: &str) -> Result<String, LocalizeError> {
        self.get(key)
            .cloned()
            .ok_or_else(|| LocalizeError::MissingKey(key.to_string()))
    }
}

impl Localize for BTreeMap<String, String> {
    fn localize(&self, key: &str) -> Result<String, LocalizeError> {
        self.get(key)
            .cloned()
            .ok_or_else(|| LocalizeError::MissingKey(key.to_string()))
    }
}

/// Passes the key through unchanged. Used when no catalog is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawKey;

impl Localize for RawKey {
    fn localize(&self, key: &str) -> Result<String, LocalizeError> {
        Ok(key.to_string())
    }
}
