//! `basalt-shm`: scoped ownership of a named shared-memory segment.
//!
//! A segment is a file mapped with `memmap2`; the deployment default lives
//! under `/dev/shm`, which gives POSIX shared-memory semantics through the
//! plain file API. Two roles exist:
//!
//! - **create**: the publisher creates (or re-opens) the named segment,
//!   verifies its size, and maps it read-write. Dropping the creator unmaps
//!   and unlinks the name, so the segment does not outlive its owner.
//! - **attach**: a consumer opens the existing segment by name, verifies its
//!   size, and maps it. Dropping an attachment unmaps only; the name stays.
//!
//! The attach mapping is writable: the SPSC protocol in `basalt-icc` requires
//! the consumer to publish its read cursor into the segment. Ownership, not
//! page protection, is what distinguishes the roles.
//!
//! Size verification is strict in both roles. A pre-existing segment whose
//! size differs from the requested size fails construction rather than being
//! silently reused or resized.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("segment name must not be empty")]
    EmptyName,

    #[error("segment size must not be zero")]
    ZeroSize,

    #[error("failed to open segment '{path}'")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to size segment '{path}'")]
    Resize {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("segment '{path}' is {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("failed to map segment '{path}'")]
    Map {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A mapped shared-memory segment. Unmaps on drop; the creating role also
/// unlinks the backing name on drop.
pub struct ShmSegment {
    map: MmapMut,
    _file: File,
    path: PathBuf,
    owner: bool,
}

impl ShmSegment {
    /// Creates the named segment sized to `size` bytes and maps it
    /// read-write. A fresh segment starts zero-filled. An existing segment
    /// of exactly `size` bytes is reused as-is; any other size fails.
    pub fn create<P: AsRef<Path>>(path: P, size: usize) -> Result<Self, ShmError> {
        let path = validate_path(path.as_ref())?;
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| ShmError::Open {
                path: display(&path),
                source,
            })?;

        let current = file_len(&file, &path)?;
        if current == 0 {
            file.set_len(size as u64).map_err(|source| ShmError::Resize {
                path: display(&path),
                source,
            })?;
        } else if current != size as u64 {
            return Err(ShmError::SizeMismatch {
                path: display(&path),
                expected: size as u64,
                actual: current,
            });
        }

        let map = map_rw(&file, &path)?;
        Ok(Self {
            map,
            _file: file,
            path,
            owner: true,
        })
    }

    /// Opens an existing segment of exactly `expected_size` bytes and maps
    /// it. The attachment takes no ownership of the name.
    pub fn attach<P: AsRef<Path>>(path: P, expected_size: usize) -> Result<Self, ShmError> {
        let path = validate_path(path.as_ref())?;
        if expected_size == 0 {
            return Err(ShmError::ZeroSize);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| ShmError::Open {
                path: display(&path),
                source,
            })?;

        let current = file_len(&file, &path)?;
        if current != expected_size as u64 {
            return Err(ShmError::SizeMismatch {
                path: display(&path),
                expected: expected_size as u64,
                actual: current,
            });
        }

        let map = map_rw(&file, &path)?;
        Ok(Self {
            map,
            _file: file,
            path,
            owner: false,
        })
    }

    /// Base address of the mapping. Page-aligned by the OS.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.map.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle created the segment and will unlink it on drop.
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if self.owner {
            // The mapping itself is released by MmapMut's drop; attached
            // consumers keep their mappings alive past the unlink.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn validate_path(path: &Path) -> Result<PathBuf, ShmError> {
    if path.as_os_str().is_empty() {
        return Err(ShmError::EmptyName);
    }
    Ok(path.to_path_buf())
}

fn file_len(file: &File, path: &Path) -> Result<u64, ShmError> {
    let meta = file.metadata().map_err(|source| ShmError::Open {
        path: display(path),
        source,
    })?;
    Ok(meta.len())
}

fn map_rw(file: &File, path: &Path) -> Result<MmapMut, ShmError> {
    // The file is held open for the lifetime of the mapping.
    unsafe { MmapMut::map_mut(file) }.map_err(|source| ShmError::Map {
        path: display(path),
        source,
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
