//! The SSOT store (C1): atomic read-modify-write of the JSON documents
//! under `.bagakit/ft-harness/` (spec §4.1).
//!
//! Locking mirrors the teacher's `config/user.rs::acquire_config_lock`: a
//! sidecar `<path>.lock` file taken with `fs2::FileExt::lock_exclusive`,
//! released when the guard drops. Writes go through a `NamedTempFile` in
//! the same directory, `sync_all()`, then `persist()` (an atomic rename on
//! POSIX filesystems) — the teacher's own `save_to()` writes in place with
//! plain `fs::write`, which this spec's atomicity contract (§4.1) requires
//! we not do.

pub mod schema;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::FtError;

/// A JSON document persisted by the store. `schema_version`/`validate` let
/// `Store::load`/`Store::mutate` enforce forward-compatibility and the
/// invariants of spec §3 before anything is written back to disk.
pub trait Document: Serialize + DeserializeOwned {
    fn schema_version(&self) -> u32;
    fn validate(&self) -> Result<(), FtError>;
}

/// Current maximum schema version this build understands. A document
/// claiming a newer version is `Corrupt` (spec §4.1 forward-compat note).
const MAX_KNOWN_SCHEMA_VERSION: u32 = schema::SCHEMA_VERSION;

fn lock_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

/// RAII guard holding the advisory lock for one SSOT path. Lock is released
/// on drop even if the caller panics or the process is killed (spec §5).
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn acquire_lock(path: &Path) -> Result<LockGuard, FtError> {
    let lock_path = lock_path(path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|e| FtError::Io {
            context: format!("creating directory for {}", lock_path.display()),
            source: e.to_string(),
        })?;
    }
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| FtError::Io {
            context: format!("opening lock file {}", lock_path.display()),
            source: e.to_string(),
        })?;
    file.lock_exclusive().map_err(|e| FtError::Io {
        context: format!("locking {}", lock_path.display()),
        source: e.to_string(),
    })?;
    Ok(LockGuard { file })
}

/// Load a document from disk without taking the write lock. Callers that
/// intend to modify the document should use [`Store::mutate`] instead —
/// this is for read-only consumers (doctor, status queries).
pub fn load<T: Document>(path: &Path) -> Result<T, FtError> {
    if !path.exists() {
        return Err(FtError::NotFound {
            what: path.display().to_string(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|e| FtError::Io {
        context: format!("reading {}", path.display()),
        source: e.to_string(),
    })?;
    let doc: T = serde_json::from_str(&raw).map_err(|e| FtError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if doc.schema_version() > MAX_KNOWN_SCHEMA_VERSION {
        return Err(FtError::Corrupt {
            path: path.to_path_buf(),
            reason: format!(
                "schema_version {} is newer than this build understands ({})",
                doc.schema_version(),
                MAX_KNOWN_SCHEMA_VERSION
            ),
        });
    }
    Ok(doc)
}

fn write_atomic<T: Document>(path: &Path, doc: &T) -> Result<(), FtError> {
    doc.validate().map_err(|e| match e {
        FtError::Corrupt { reason, .. } => FtError::Corrupt {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| FtError::Io {
        context: format!("creating directory {}", dir.display()),
        source: e.to_string(),
    })?;
    let mut body = serde_json::to_vec_pretty(doc).map_err(|e| FtError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    body.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| FtError::Io {
        context: format!("creating temp file in {}", dir.display()),
        source: e.to_string(),
    })?;
    use std::io::Write;
    tmp.write_all(&body).map_err(|e| FtError::Io {
        context: format!("writing temp file for {}", path.display()),
        source: e.to_string(),
    })?;
    tmp.as_file().sync_all().map_err(|e| FtError::Io {
        context: format!("fsyncing temp file for {}", path.display()),
        source: e.to_string(),
    })?;
    tmp.persist(path).map_err(|e| FtError::Io {
        context: format!("renaming temp file onto {}", path.display()),
        source: e.to_string(),
    })?;
    Ok(())
}

/// Load-transform-validate-write under an exclusive per-path lock (spec
/// §4.1, §5). `transform` receives the current document (defaulted if the
/// file does not yet exist) and returns the new document, or an error —
/// returning an error aborts without writing anything.
///
/// The lock is held only across the load/transform/write — never across a
/// subsequent VCS or gate subprocess call (spec §9 "do not hold a lock
/// across subprocess calls").
pub fn mutate<T, F>(path: &Path, transform: F) -> Result<T, FtError>
where
    T: Document + Default,
    F: FnOnce(T) -> Result<T, FtError>,
{
    let _guard = acquire_lock(path)?;
    let current = if path.exists() {
        load::<T>(path)?
    } else {
        T::default()
    };
    let next = transform(current)?;
    write_atomic(path, &next)?;
    Ok(next)
}

/// Same contract as [`mutate`], for documents that must already exist on
/// disk (`state.json`, and the index once `initialize-harness` has run):
/// `NotFound` propagates instead of materializing `T::default()`.
///
/// This is the right entry point for `FeatState`, which has no meaningful
/// default — a defaulted feat has an empty `id`/`slug` that
/// `Document::validate` rejects anyway, so treating "missing" as "start
/// from a blank feat" is never correct. It also means `FeatState` does not
/// need a `Default` impl at all.
pub fn mutate_existing<T, F>(path: &Path, transform: F) -> Result<T, FtError>
where
    T: Document,
    F: FnOnce(T) -> Result<T, FtError>,
{
    let _guard = acquire_lock(path)?;
    let current = load::<T>(path)?;
    let next = transform(current)?;
    write_atomic(path, &next)?;
    Ok(next)
}

/// Create a brand-new document at `path`, failing if one already exists.
/// Used by `create-feat` (new `state.json`/`tasks.json`) where "already
/// exists" must be a hard error rather than silently merged.
pub fn create<T: Document>(path: &Path, doc: &T) -> Result<(), FtError> {
    let _guard = acquire_lock(path)?;
    if path.exists() {
        return Err(FtError::InvalidTransition {
            reason: format!("{} already exists", path.display()),
        });
    }
    write_atomic(path, doc)
}
