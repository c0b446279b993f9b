//! Registry persistence: the append-only edit log.
//!
//! Every mutation of registry state is recorded as one `RegistryEdit`,
//! serialized as a JSON line appended to the `REGISTRY` file in the
//! registry directory. Opening a registry replays the log from the top to
//! rebuild the in-memory state. Changelog entries travel through the same
//! log, which makes the on-disk history append-only by construction.

use crate::changelog::ChangelogEntry;
use crate::definition::ScriptDefinition;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Name of the edit log file inside the registry directory.
pub const LOG_FILE_NAME: &str = "REGISTRY";

/// One recorded mutation of registry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryEdit {
    /// A definition was created.
    Create {
        /// The full definition as created.
        definition: ScriptDefinition,
    },
    /// A definition's content was overwritten (uuid already rotated).
    Update {
        /// The full definition after the update.
        definition: ScriptDefinition,
    },
    /// A definition's soft-delete flag was flipped.
    SetDeleted {
        /// The definition id.
        id: u64,
        /// The new flag value.
        deleted: bool,
    },
    /// A changelog entry was appended.
    AppendChangelog {
        /// The appended entry.
        entry: ChangelogEntry,
    },
}

/// The append-only edit log backing a registry directory.
pub struct EditLog {
    /// Path to the log file.
    path: PathBuf,
    /// Open handle, positioned for appending.
    file: File,
    /// Fsync after every append.
    sync_writes: bool,
}

impl EditLog {
    /// Opens the edit log in `dir`, replaying any existing edits.
    ///
    /// Returns the log handle (positioned for appending) together with the
    /// replayed edits in append order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corruption` if an existing log contains a line that
    /// does not parse as a `RegistryEdit`.
    pub fn open(dir: &Path, sync_writes: bool) -> Result<(Self, Vec<RegistryEdit>)> {
        let path = dir.join(LOG_FILE_NAME);
        let mut edits = Vec::new();

        if path.exists() {
            log::info!("Replaying registry log: {:?}", path);

            let file = File::open(&path)?;
            let reader = BufReader::new(file);

            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }

                let edit: RegistryEdit = serde_json::from_str(&line).map_err(|e| {
                    Error::corruption(format!("Failed to parse registry log entry: {}", e))
                })?;

                edits.push(edit);
            }

            log::info!("Replayed {} registry edits", edits.len());
        } else {
            log::info!("Creating new registry log: {:?}", path);
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok((Self { path, file, sync_writes }, edits))
    }

    /// Appends one edit to the log.
    pub fn append(&mut self, edit: &RegistryEdit) -> Result<()> {
        let json = serde_json::to_string(edit)
            .map_err(|e| Error::internal(format!("Failed to serialize registry edit: {}", e)))?;

        writeln!(self.file, "{}", json)?;
        self.file.flush()?;

        if self.sync_writes {
            self.file.sync_all()?;
        }

        Ok(())
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
