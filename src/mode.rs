//! Operating mode and its persistence
//!
//! The mode selects which SDK set a build needs. It is read once at the start
//! of every operation and passed down explicitly; where it is stored is the
//! business of a [`ModeStore`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Build mode of the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Lightweight testing build with the minimal SDK set
    Prototype,
    /// Production build with monetization and attribution SDKs
    Full,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Prototype => "prototype",
            Mode::Full => "full",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prototype" | "proto" => Ok(Mode::Prototype),
            "full" | "production" => Ok(Mode::Full),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Persistent storage for the project's mode flag
///
/// `None` means the mode has never been chosen.
pub trait ModeStore {
    fn load_mode(&self) -> Result<Option<Mode>>;
    fn store_mode(&mut self, mode: Option<Mode>) -> Result<()>;
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryModeStore {
    mode: Option<Mode>,
}

impl MemoryModeStore {
    pub fn new(mode: Option<Mode>) -> Self {
        Self { mode }
    }
}

impl ModeStore for MemoryModeStore {
    fn load_mode(&self) -> Result<Option<Mode>> {
        Ok(self.mode)
    }

    fn store_mode(&mut self, mode: Option<Mode>) -> Result<()> {
        self.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("prototype".parse::<Mode>().unwrap(), Mode::Prototype);
        assert_eq!(" Full ".parse::<Mode>().unwrap(), Mode::Full);
        assert!(matches!("beta".parse::<Mode>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryModeStore::default();
        assert_eq!(store.load_mode().unwrap(), None);
        store.store_mode(Some(Mode::Full)).unwrap();
        assert_eq!(store.load_mode().unwrap(), Some(Mode::Full));
    }
}
