//! Cabinet persistence with file locking.
//!
//! The whole cabinet is one JSON document. Stock changes and the events
//! that explain them live in the same document, so writing it atomically
//! keeps them from ever diverging on disk.

use crate::{Cabinet, Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

impl Cabinet {
    /// Load the cabinet from a file with shared locking
    ///
    /// Returns an empty cabinet if the file doesn't exist. A file that
    /// exists but cannot be parsed is an error: silently starting over would
    /// throw away the user's medication history.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No cabinet file found at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let cabinet: Cabinet = serde_json::from_str(&contents).map_err(|e| {
            tracing::warn!("Cabinet file {:?} is corrupt: {}", path, e);
            Error::State(format!("cannot parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            "Loaded {} medications from {:?}",
            cabinet.medications.len(),
            path
        );
        Ok(cabinet)
    }

    /// Save the cabinet to a file with exclusive locking
    ///
    /// Atomically writes state by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("{} has no parent directory", path.display())))?;
        std::fs::create_dir_all(parent)?;

        // Unique temp file in the same directory so the rename is atomic
        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved cabinet to {:?}", path);
        Ok(())
    }

    /// Load the cabinet, modify it, and save it back
    ///
    /// The load-modify-save cycle holds an exclusive lock on a sibling
    /// `.lock` file so concurrent writers cannot lose each other's updates.
    /// If `f` fails nothing is written.
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Cabinet) -> Result<T>,
    {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = File::create(&lock_path)?;
        lock.lock_exclusive()?;

        let result = Self::load(path).and_then(|mut cabinet| {
            let value = f(&mut cabinet)?;
            cabinet.save(path)?;
            Ok(value)
        });

        lock.unlock()?;
        result
    }
}
