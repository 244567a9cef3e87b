//! Container store: owns the append-write handle and the random-access read
//! handle, performs framed appends, header patch-writes, and positional
//! reads.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::container::header::{self, Header};
use crate::error::{Error, Result};

pub struct ContainerStore {
    path: PathBuf,
    write: Mutex<Option<File>>,
    read: RwLock<Option<File>>,
}

fn no_write_handle() -> Error {
    Error::NotSupported {
        operation: "write on a disposed or completed partfile",
    }
}

fn no_read_handle() -> Error {
    Error::NotSupported {
        operation: "read on a disposed partfile",
    }
}

impl ContainerStore {
    /// Creates the container exclusively and opens both handles.
    pub fn create_new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = OpenOptions::new().write(true).create_new(true).open(path)?;
        let reader = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            write: Mutex::new(Some(writer)),
            read: RwLock::new(Some(reader)),
        })
    }

    /// Opens an existing container for resume: read handle plus a write
    /// handle positioned at end-of-file for further appends.
    pub fn open_for_resume(path: &Path) -> Result<Self> {
        let reader = OpenOptions::new().read(true).open(path)?;
        let mut writer = OpenOptions::new().read(true).write(true).open(path)?;
        writer.seek(SeekFrom::End(0))?;
        Ok(Self {
            path: path.to_path_buf(),
            write: Mutex::new(Some(writer)),
            read: RwLock::new(Some(reader)),
        })
    }

    /// Opens an existing container read-only, for header inspection during
    /// resume before a write handle is needed.
    pub fn open_read_only(path: &Path) -> Result<File> {
        Ok(OpenOptions::new().read(true).open(path)?)
    }

    /// Builds a store with only a read handle, open against `completed_path`.
    /// Used for the `size == 0` shortcut, where the completed file is
    /// materialized directly and no container is ever created. `path()`
    /// reports `container_path` — the container file's would-be path, which
    /// never exists — rather than aliasing the completed file that's
    /// actually backing the read handle.
    pub fn for_completed(completed_path: &Path, container_path: &Path) -> Result<Self> {
        let reader = OpenOptions::new().read(true).open(completed_path)?;
        Ok(Self {
            path: container_path.to_path_buf(),
            write: Mutex::new(None),
            read: RwLock::new(Some(reader)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_header(&self, header: &Header) -> Result<u64> {
        let mut guard = self.write.lock().unwrap();
        let f = guard.as_mut().ok_or_else(no_write_handle)?;
        f.seek(SeekFrom::Start(0))?;
        let headers_size = header.write_to(f)?;
        f.flush()?;
        f.seek(SeekFrom::End(0))?;
        Ok(headers_size)
    }

    /// Patches an 8-byte `(ordinal, size)` boundary field at `offset`,
    /// preserving the write handle's end-of-file position across the patch.
    pub fn patch_boundary(&self, offset: u64, pos: i64, size: i64) -> Result<()> {
        let mut guard = self.write.lock().unwrap();
        let f = guard.as_mut().ok_or_else(no_write_handle)?;
        let eof = f.stream_position()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(&header::encode_boundary_patch(pos, size))?;
        f.flush()?;
        f.seek(SeekFrom::Start(eof))?;
        Ok(())
    }

    /// Appends one framed record: a 4-byte little-endian chunk id followed
    /// by `payload`.
    pub fn append_record(&self, chunk_id: u32, payload: &[u8], flush: bool) -> Result<()> {
        let mut guard = self.write.lock().unwrap();
        let f = guard.as_mut().ok_or_else(no_write_handle)?;
        f.write_all(&chunk_id.to_le_bytes())?;
        f.write_all(payload)?;
        if flush {
            f.flush()?;
        }
        Ok(())
    }

    pub fn file_len(&self) -> Result<u64> {
        let guard = self.read.read().unwrap();
        let f = guard.as_ref().ok_or_else(no_read_handle)?;
        Ok(f.metadata()?.len())
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`, without
    /// disturbing any other reader's view of the handle (positional I/O,
    /// no shared seek cursor).
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let guard = self.read.read().unwrap();
        let f = guard.as_ref().ok_or_else(no_read_handle)?;
        positional_read_exact(f, offset, buf)
    }

    /// Closes the write handle. Idempotent.
    pub fn close_write(&self) -> Result<()> {
        let mut guard = self.write.lock().unwrap();
        if let Some(mut f) = guard.take() {
            f.flush()?;
        }
        Ok(())
    }

    /// Closes the read handle. Idempotent.
    pub fn close_read(&self) -> Result<()> {
        let mut guard = self.read.write().unwrap();
        guard.take();
        Ok(())
    }

    /// Swaps the read handle to point at the completed file, excluding
    /// concurrent readers for the duration of the swap.
    pub fn swap_read_handle(&self, path: &Path) -> Result<()> {
        let f = OpenOptions::new().read(true).open(path)?;
        let mut guard = self.read.write().unwrap();
        *guard = Some(f);
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
pub(crate) fn positional_read_exact(f: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::os::unix::fs::FileExt;
    f.read_exact_at(buf, offset)?;
    Ok(())
}

#[cfg(windows)]
pub(crate) fn positional_read_exact(f: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::os::windows::fs::FileExt;
    let mut total = 0usize;
    while total < buf.len() {
        let n = f.seek_read(&mut buf[total..], offset + total as u64)?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        total += n;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn positional_read_exact(_f: &File, _offset: u64, _buf: &mut [u8]) -> Result<()> {
    compile_error!("partfile requires positional file I/O (unix or windows)");
}
