use crate::error::{PgasError, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared variables of one logical thread.
///
/// A variable must be declared before it can be written, and written before
/// it can be read. Values are kept as the encoded bytes of their element
/// type; collectives read and write them without knowing the type.
#[derive(Debug, Default)]
pub struct Storage {
    vars: RwLock<HashMap<String, Option<Vec<u8>>>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Option<Vec<u8>>>>> {
        self.vars
            .read()
            .map_err(|_| PgasError::LockPoisoned("storage"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Option<Vec<u8>>>>> {
        self.vars
            .write()
            .map_err(|_| PgasError::LockPoisoned("storage"))
    }

    /// Declare `name`. Declaring twice keeps the current value.
    pub fn declare(&self, name: &str) -> Result<()> {
        self.write()?.entry(name.to_string()).or_insert(None);
        Ok(())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.read().map(|v| v.contains_key(name)).unwrap_or(false)
    }

    pub fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let mut vars = self.write()?;
        let slot = vars.get_mut(name).ok_or_else(|| PgasError::UnknownVariable {
            name: name.to_string(),
        })?;
        *slot = Some(bytes);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        let vars = self.read()?;
        match vars.get(name) {
            None => Err(PgasError::UnknownVariable {
                name: name.to_string(),
            }),
            Some(None) => Err(PgasError::VariableUnset {
                name: name.to_string(),
            }),
            Some(Some(bytes)) => Ok(bytes.clone()),
        }
    }
}
