use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

const OBJECTS: &str = "objects";
const SCRATCH: &str = "scratch";

/// Opaque reference to a file held by a content-addressed store.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::store::FileHandle;
///
/// let handle = FileHandle::new("e3b0c442");
/// assert_eq!(handle.as_str(), "e3b0c442");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Narrow interface to the file store every stage talks to.
///
/// Handles are only valid once produced by `write_global_file` (or
/// `import_file`); files behind a handle are never mutated.
pub trait FileStore: Send + Sync {
    /// Fresh scratch directory for one stage, removed when dropped.
    fn local_temp_dir(&self) -> PipelineResult<TempDir>;

    /// Copy the file behind `handle` to `dest` and return `dest`.
    fn read_global_file(&self, handle: &FileHandle, dest: &Path) -> PipelineResult<PathBuf>;

    /// Store the file at `src` and return its handle.
    fn write_global_file(&self, src: &Path) -> PipelineResult<FileHandle>;

    /// Bring a file from outside the pipeline into the store.
    fn import_file(&self, src: &Path) -> PipelineResult<FileHandle> {
        self.write_global_file(src)
    }

    /// Copy a stored file out of the pipeline.
    fn export_file(&self, handle: &FileHandle, dest: &Path) -> PipelineResult<()> {
        self.read_global_file(handle, dest).map(|_| ())
    }
}

/// Directory-backed store keyed by the SHA-256 of each file's content.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::store::{FileStore, LocalFileStore};
/// use std::path::Path;
///
/// let store = LocalFileStore::new("/tmp/store").unwrap();
/// let handle = store.import_file(Path::new("ref.fasta")).unwrap();
/// store.export_file(&handle, Path::new("/tmp/ref.copy.fasta")).unwrap();
/// ```
#[derive(Debug)]
pub struct LocalFileStore {
    objects: PathBuf,
    scratch: PathBuf,
    names: DashMap<FileHandle, String>,
}

impl LocalFileStore {
    pub fn new(root: impl AsRef<Path>) -> PipelineResult<Self> {
        let root = root.as_ref();
        let objects = root.join(OBJECTS);
        let scratch = root.join(SCRATCH);

        std::fs::create_dir_all(&objects)?;
        std::fs::create_dir_all(&scratch)?;

        log::info!("INFO [STORE]: file store rooted at {}", root.display());

        Ok(Self {
            objects,
            scratch,
            names: DashMap::new(),
        })
    }

    /// Filename the handle was last written under, if this process wrote it.
    pub fn name_of(&self, handle: &FileHandle) -> Option<String> {
        self.names.get(handle).map(|name| name.value().clone())
    }

    fn object_path(&self, handle: &FileHandle) -> PathBuf {
        self.objects.join(handle.as_str())
    }
}

impl FileStore for LocalFileStore {
    fn local_temp_dir(&self) -> PipelineResult<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(&self.scratch)?)
    }

    fn read_global_file(&self, handle: &FileHandle, dest: &Path) -> PipelineResult<PathBuf> {
        let object = self.object_path(handle);
        if !object.is_file() {
            return Err(PipelineError::UnknownHandle(handle.clone()));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&object, dest)?;

        Ok(dest.to_path_buf())
    }

    fn write_global_file(&self, src: &Path) -> PipelineResult<FileHandle> {
        let handle = FileHandle::new(digest(src)?);
        let object = self.object_path(&handle);

        // INFO: identical content is stored once
        if !object.exists() {
            let staging = tempfile::NamedTempFile::new_in(&self.objects)?;
            std::fs::copy(src, staging.path())?;
            staging
                .persist(&object)
                .map_err(|e| PipelineError::Io(e.error))?;
        }

        if let Some(name) = src.file_name() {
            self.names
                .insert(handle.clone(), name.to_string_lossy().into_owned());
        }

        log::debug!("DEBUG [STORE]: {} -> {}", src.display(), handle);

        Ok(handle)
    }

    fn export_file(&self, handle: &FileHandle, dest: &Path) -> PipelineResult<()> {
        self.read_global_file(handle, dest)?;

        log::info!(
            "INFO [STORE]: exported {} ({}) -> {}",
            self.name_of(handle).unwrap_or_else(|| String::from("<imported>")),
            handle,
            dest.display()
        );

        Ok(())
    }
}

/// Hex SHA-256 of a file's content.
fn digest(path: &Path) -> PipelineResult<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;

    Ok(hex::encode(hasher.finalize()))
}
