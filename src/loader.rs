/// Dataset Loader
///
/// Reads the assessment file once per session and hands out the same
/// shared `Arc<Table>` on every later call, as long as the file on disk is
/// unchanged (same path, length and modification time).

use crate::config::ExplorerConfig;
use crate::error::{ExplorerError, Result};
use crate::table::Table;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Identity of the source file at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl SourceStamp {
    pub fn of(path: &Path) -> Result<SourceStamp> {
        let metadata = std::fs::metadata(path).map_err(|e| not_found_or_io(e, path))?;
        if !metadata.is_file() {
            return Err(ExplorerError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(SourceStamp {
            path: path.to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

fn not_found_or_io(err: std::io::Error, path: &Path) -> ExplorerError {
    if err.kind() == ErrorKind::NotFound {
        ExplorerError::SourceNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ExplorerError::Io(err)
    }
}

pub struct DatasetLoader {
    config: ExplorerConfig,
    cache: Mutex<Option<(SourceStamp, Arc<Table>)>>,
}

impl DatasetLoader {
    pub fn new(config: ExplorerConfig) -> Self {
        DatasetLoader {
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Load the dataset, reusing the cached table when the source is unchanged.
    ///
    /// Fails with `SourceNotFound` when the file is absent. Missing columns
    /// are not checked here; they surface as `SchemaMismatch` when first used.
    pub fn load(&self) -> Result<Arc<Table>> {
        let path = self.config.data_path.as_path();
        let stamp = SourceStamp::of(path)?;

        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((cached, table)) = cache.as_ref() {
            if *cached == stamp {
                debug!("dataset cache hit for {}", path.display());
                return Ok(Arc::clone(table));
            }
        }

        let file = File::open(path).map_err(|e| not_found_or_io(e, path))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let table = Arc::new(Table::from_csv_reader(&name, BufReader::new(file), &self.config)?);

        info!(
            "loaded dataset {} ({} rows, {} columns)",
            path.display(),
            table.len(),
            table.schema().len()
        );

        *cache = Some((stamp, Arc::clone(&table)));
        Ok(table)
    }

    /// Forget the cached table; the next `load` reads the file again.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cache = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.is_some())
            .unwrap_or(false)
    }
}
