use crate::error::{OrthowatchError, Result};
use crate::wfs::Layer;
use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub mod types;
pub use types::{format_watermark, parse_watermark};

/// Persistence for the per-layer "newest processed date"
///
/// Layers are processed one after another by a single process, so
/// implementations need no cross-process locking. Concurrent invocations
/// for the same layer are assumed to be serialized by the scheduler.
pub trait WatermarkStore: Send + Sync {
    /// Stored watermark, `None` if the layer was never saved
    fn load(&self, layer: &Layer) -> Result<Option<NaiveDate>>;

    /// Replace the stored watermark
    fn save(&self, layer: &Layer, date: NaiveDate) -> Result<()>;
}

impl<S: WatermarkStore + ?Sized> WatermarkStore for std::sync::Arc<S> {
    fn load(&self, layer: &Layer) -> Result<Option<NaiveDate>> {
        (**self).load(layer)
    }

    fn save(&self, layer: &Layer, date: NaiveDate) -> Result<()> {
        (**self).save(layer, date)
    }
}

/// One plain-text file per layer: `<dir>/last_date_<year>.txt`
pub struct FileWatermarkStore {
    dir: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created lazily on the first save.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the watermark files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `layer`
    pub fn path_for(&self, layer: &Layer) -> PathBuf {
        self.dir.join(format!("last_date_{}.txt", layer.year()))
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self, layer: &Layer) -> Result<Option<NaiveDate>> {
        let path = self.path_for(layer);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrthowatchError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))
                .into())
            }
        };

        parse_watermark(&content).map(Some).ok_or_else(|| {
            OrthowatchError::Storage(format!(
                "{} does not contain a YYYY-MM-DD date: {:?}",
                path.display(),
                content.trim()
            ))
            .into()
        })
    }

    fn save(&self, layer: &Layer, date: NaiveDate) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))
            .map_err(|e| OrthowatchError::Storage(format!("{:#}", e)))?;

        let path = self.path_for(layer);
        let tmp = path.with_extension("txt.tmp");

        std::fs::write(&tmp, format_watermark(date))
            .with_context(|| format!("Failed to write {}", tmp.display()))
            .map_err(|e| OrthowatchError::Storage(format!("{:#}", e)))?;

        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))
            .map_err(|e| OrthowatchError::Storage(format!("{:#}", e)))?;

        tracing::info!(layer = %layer, date = %date, path = %path.display(), "Watermark updated");
        Ok(())
    }
}

/// Read-only view over another store: loads pass through, saves are
/// logged and dropped. Used for `--dry-run`.
pub struct ReadOnlyStore<S> {
    inner: S,
}

impl<S: WatermarkStore> ReadOnlyStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: WatermarkStore> WatermarkStore for ReadOnlyStore<S> {
    fn load(&self, layer: &Layer) -> Result<Option<NaiveDate>> {
        self.inner.load(layer)
    }

    fn save(&self, layer: &Layer, date: NaiveDate) -> Result<()> {
        tracing::info!(layer = %layer, date = %date, "Dry run: watermark not written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_error_contains, date, temp_dir, MemoryWatermarkStore};

    fn layer() -> Layer {
        Layer::new("SkorowidzOrtofomapy2024", 2024)
    }

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path());
        assert_eq!(store.load(&layer()).unwrap(), None);
    }

    #[test]
    fn test_file_store_missing_directory_is_none() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path().join("not-yet-created"));
        assert_eq!(store.load(&layer()).unwrap(), None);
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path().join("state"));
        store.save(&layer(), date("2024-06-10")).unwrap();

        assert_eq!(store.load(&layer()).unwrap(), Some(date("2024-06-10")));
        let raw = std::fs::read_to_string(store.path_for(&layer())).unwrap();
        assert_eq!(raw, "2024-06-10");
    }

    #[test]
    fn test_file_store_overwrites() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path());
        store.save(&layer(), date("2024-06-01")).unwrap();
        store.save(&layer(), date("2024-06-10")).unwrap();
        assert_eq!(store.load(&layer()).unwrap(), Some(date("2024-06-10")));
        assert!(!store.path_for(&layer()).with_extension("txt.tmp").exists());
    }

    #[test]
    fn test_file_store_layers_are_independent() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path());
        let previous = Layer::new("SkorowidzOrtofomapy2023", 2023);
        store.save(&previous, date("2023-12-30")).unwrap();

        assert_eq!(store.load(&layer()).unwrap(), None);
        assert_eq!(store.path_for(&previous).file_name().unwrap(), "last_date_2023.txt");
    }

    #[test]
    fn test_file_store_garbage_is_storage_error() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path());
        std::fs::write(store.path_for(&layer()), "yesterday").unwrap();

        assert_error_contains(store.load(&layer()), "does not contain a YYYY-MM-DD date");
    }

    #[test]
    fn test_file_store_accepts_trailing_newline() {
        let dir = temp_dir();
        let store = FileWatermarkStore::new(dir.path());
        std::fs::write(store.path_for(&layer()), "2024-06-10\n").unwrap();
        assert_eq!(store.load(&layer()).unwrap(), Some(date("2024-06-10")));
    }

    #[test]
    fn test_file_store_unwritable_dir_is_storage_error() {
        let dir = temp_dir();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = FileWatermarkStore::new(blocker.join("state"));

        // The io error follows the context after ": ".
        let expected = format!("Failed to create {}: ", blocker.join("state").display());
        assert_error_contains(store.save(&layer(), date("2024-06-10")), &expected);
    }

    #[test]
    fn test_read_only_store_drops_saves() {
        let inner = MemoryWatermarkStore::with(&layer(), date("2024-06-01"));
        let store = ReadOnlyStore::new(inner);
        store.save(&layer(), date("2024-06-10")).unwrap();
        assert_eq!(store.load(&layer()).unwrap(), Some(date("2024-06-01")));
    }
}
