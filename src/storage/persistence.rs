//! Chain persistence
//!
//! The whole world state is a single JSON document. Every save rotates the
//! previous document into numbered backups before the new one is renamed
//! into place.

use crate::chain::Chain;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Chain state not found at {0}")]
    NotFound(PathBuf),
    #[error("Backup {0} not found")]
    BackupNotFound(usize),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub chain_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".safe_data"),
            chain_file: "chain.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// On-disk document: the chain plus when it was written
#[derive(Debug, Serialize, Deserialize)]
struct SavedChain {
    saved_at: DateTime<Utc>,
    chain: Chain,
}

#[derive(Serialize)]
struct SavedChainRef<'a> {
    saved_at: DateTime<Utc>,
    chain: &'a Chain,
}

/// Chain storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a storage manager, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::new(StorageConfig::default())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn chain_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.chain_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.chain_file, index))
    }

    /// Save the chain, keeping the previous document as backup 0
    pub fn save(&self, chain: &Chain) -> Result<(), StorageError> {
        let path = self.chain_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let temp_path = path.with_extension("tmp");
        save_to_file(chain, &temp_path)?;
        fs::rename(&temp_path, &path)?;

        info!("Saved chain state to {}", path.display());
        Ok(())
    }

    /// Load the saved chain
    pub fn load(&self) -> Result<Chain, StorageError> {
        let path = self.chain_path();
        if !path.exists() {
            return Err(StorageError::NotFound(path));
        }
        load_from_file(&path)
    }

    /// Load the saved chain, or start a new one when nothing was saved
    pub fn load_or_default(&self) -> Result<Chain, StorageError> {
        match self.load() {
            Err(StorageError::NotFound(_)) => Ok(Chain::default()),
            other => other,
        }
    }

    pub fn exists(&self) -> bool {
        self.chain_path().exists()
    }

    /// Delete the saved chain (backups are kept)
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.chain_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let last = self.config.max_backups - 1;
        let oldest = self.backup_path(last);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..last).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }
        Ok(())
    }

    /// Load backup `index` (0 is the most recent)
    pub fn restore_backup(&self, index: usize) -> Result<Chain, StorageError> {
        let path = self.backup_path(index);
        if !path.exists() {
            return Err(StorageError::BackupNotFound(index));
        }
        load_from_file(&path)
    }

    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }

    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.chain_path();
        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}

/// Write the chain to `path`
pub fn save_to_file(chain: &Chain, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    let doc = SavedChainRef {
        saved_at: Utc::now(),
        chain,
    };
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

/// Read a chain written by [`save_to_file`]
pub fn load_from_file(path: &Path) -> Result<Chain, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let doc: SavedChain = serde_json::from_reader(reader)?;
    debug!(
        "Loaded chain state from {} (saved {})",
        path.display(),
        doc.saved_at
    );
    Ok(doc.chain)
}
