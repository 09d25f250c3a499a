//! Broker-side dialog registry
//!
//! Maps dialog ids to the dialogs the broker created on behalf of its clients.
//! Each entry remembers the unique bus name of the client that created it; a
//! lookup by anyone else fails as if the id did not exist.

use std::collections::HashMap;
use std::ops::Deref;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::dialog::LocalDialog;
use crate::error::{Result, SfcdError};

struct Entry {
    owner: String,
    dialog: LocalDialog,
}

#[derive(Default)]
pub struct DialogRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

/// A looked-up dialog, holding its own reference until dropped
pub struct DialogRef {
    dialog: LocalDialog,
}

impl Deref for DialogRef {
    type Target = LocalDialog;

    fn deref(&self) -> &LocalDialog {
        &self.dialog
    }
}

impl Drop for DialogRef {
    fn drop(&mut self) {
        trace!("Lookup of dialog {} finished", self.dialog.get_id());
    }
}

impl DialogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: &str, dialog: LocalDialog) {
        debug!("Registering dialog {} for {}", dialog.get_id(), owner);
        self.entries.lock().insert(
            dialog.get_id().to_string(),
            Entry {
                owner: owner.to_string(),
                dialog,
            },
        );
    }

    fn not_found(id: &str) -> SfcdError {
        SfcdError::Lookup(format!("no dialog with id {:?}", id))
    }

    /// Find `id` among the dialogs `owner` created.
    pub fn lookup(&self, owner: &str, id: &str) -> Result<DialogRef> {
        let entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if entry.owner == owner => Ok(DialogRef {
                dialog: entry.dialog.clone(),
            }),
            Some(_) => {
                debug!("{} asked for dialog {} it does not own", owner, id);
                Err(Self::not_found(id))
            }
            None => Err(Self::not_found(id)),
        }
    }

    /// Remove `id` and hand back the registry's reference.
    pub fn lookup_and_remove(&self, owner: &str, id: &str) -> Result<LocalDialog> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if entry.owner == owner => {}
            _ => return Err(Self::not_found(id)),
        }
        entries
            .remove(id)
            .map(|entry| entry.dialog)
            .ok_or_else(|| Self::not_found(id))
    }

    /// Drop every dialog `owner` created, returning them for teardown.
    pub fn remove_owner(&self, owner: &str) -> Vec<LocalDialog> {
        let mut entries = self.entries.lock();
        let ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| entries.remove(id))
            .map(|entry| entry.dialog)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
