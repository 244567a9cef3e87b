//! Partfile façade (C6): orchestrates creation/resume, routes `write*`/`read`
//! calls, enforces invariants, fires lifecycle events, and materializes the
//! completed file.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::container::geometry;
use crate::container::header::{self, Header};
use crate::container::index::ChunkIndex;
use crate::container::store::ContainerStore;
use crate::error::{Error, Result};
use crate::events::{self, Event};
use crate::options::Options;
use crate::stream::PartStream;

/// Mutable geometry bookkeeping: everything `calculate_partsize` fills in,
/// plus the two ordinals that anchor the offset arithmetic. Cloned out from
/// behind its lock for the duration of a read or write so the lock is never
/// held across file I/O.
#[derive(Clone, Copy, Debug)]
struct GeometryState {
    size: i64,
    headers_size: u64,
    first_chunksize: i64,
    last_chunksize: i64,
    first_chunkpos: i64,
    last_chunkpos: i64,
    chunks_total: i64,
    partsize: i64,
}

impl GeometryState {
    fn refresh(&mut self, chunksize: u32) -> Result<()> {
        let g = geometry::calculate(
            self.size,
            chunksize,
            self.first_chunksize,
            self.last_chunksize,
            self.headers_size,
        )?;
        self.first_chunksize = g.first_chunksize;
        self.last_chunksize = g.last_chunksize;
        self.chunks_total = g.chunks_total;
        self.partsize = g.partsize;
        Ok(())
    }
}

/// A resumable partial-file container: one on-disk container file
/// accumulating out-of-order fixed-size chunks, serving random-access reads
/// before all chunks are present, materializable into a contiguous
/// completed file once they are.
///
/// `Partfile` is safe to share across threads (`Send + Sync`): concurrent
/// readers are supported, but per `spec.md` §5 concurrent *writers* are not
/// — callers must serialize their own `write`/`write_first`/`write_last`
/// calls to a given instance.
pub struct Partfile {
    filename: String,
    chunksize: u32,
    completed_path: PathBuf,
    options: Options,
    store: ContainerStore,
    index: ChunkIndex,
    geometry: Mutex<GeometryState>,
    /// Serializes the write sequence (duplicate/created check, append,
    /// index publish, geometry refresh, auto-create) and guards `create()`
    /// and `dispose()`. Named for the source's `lock_create`.
    write_gate: Mutex<()>,
    created: AtomicBool,
    disposed: AtomicBool,
}

impl Partfile {
    /// Creates a brand new container.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `chunksize < 1`, if `size == -1` and
    /// `options.auto_create` is set, or if a known boundary chunk size
    /// exceeds `chunksize`. [`Error::AlreadyExists`] if the completed or
    /// container path already exists and the corresponding overwrite flag
    /// is unset.
    pub fn open_new(
        filename: impl Into<String>,
        chunksize: u32,
        size: Option<i64>,
        options: Options,
    ) -> Result<Self> {
        let filename = filename.into();
        if chunksize < 1 {
            return Err(Error::InvalidArgument {
                field: "chunksize",
                message: "must be >= 1".to_string(),
            });
        }
        let size = size.unwrap_or(-1);
        if size == -1 && options.auto_create {
            return Err(Error::InvalidArgument {
                field: "size",
                message: format!(
                    "{filename}: cannot auto_create a partfile of unknown size"
                ),
            });
        }
        let chunksize_i = chunksize as i64;
        if options.first_chunksize > chunksize_i || options.last_chunksize > chunksize_i {
            return Err(Error::InvalidArgument {
                field: "first_chunksize/last_chunksize",
                message: format!(
                    "{filename}: boundary chunk size exceeds chunksize {chunksize}"
                ),
            });
        }

        let folder = options.resolved_folder();
        let part_folder = options.resolved_part_folder();
        let completed_path = folder.join(&filename);
        let container_path = part_folder.join(format!("{filename}{}", options.part_extension));

        if completed_path.exists() {
            if !options.overwrite {
                return Err(Error::AlreadyExists { path: completed_path });
            }
            fs::remove_file(&completed_path)?;
        }

        if size == 0 {
            if let Some(parent) = completed_path.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(&completed_path)?;
            let store = ContainerStore::for_completed(&completed_path, &container_path)?;
            return Ok(Self {
                filename,
                chunksize,
                completed_path,
                options,
                store,
                index: ChunkIndex::new(),
                geometry: Mutex::new(GeometryState {
                    size: 0,
                    headers_size: 0,
                    first_chunksize: 0,
                    last_chunksize: 0,
                    first_chunkpos: -1,
                    last_chunkpos: -1,
                    chunks_total: 0,
                    partsize: 0,
                }),
                write_gate: Mutex::new(()),
                created: AtomicBool::new(true),
                disposed: AtomicBool::new(false),
            });
        }

        if container_path.exists() {
            if !options.part_overwrite {
                return Err(Error::AlreadyExists { path: container_path });
            }
            fs::remove_file(&container_path)?;
        }

        let store = ContainerStore::create_new(&container_path)?;
        let header = Header {
            size,
            first_chunkpos: -1,
            first_chunksize: options.first_chunksize,
            last_chunkpos: -1,
            last_chunksize: options.last_chunksize,
            chunksize,
            filename: filename.clone(),
            folder: folder.to_string_lossy().into_owned(),
            part_folder: part_folder.to_string_lossy().into_owned(),
        };
        let headers_size = store.write_header(&header)?;

        let mut geometry = GeometryState {
            size,
            headers_size,
            first_chunksize: options.first_chunksize,
            last_chunksize: options.last_chunksize,
            first_chunkpos: -1,
            last_chunkpos: -1,
            chunks_total: -1,
            partsize: -1,
        };
        geometry.refresh(chunksize)?;

        Ok(Self {
            filename,
            chunksize,
            completed_path,
            options,
            store,
            index: ChunkIndex::new(),
            geometry: Mutex::new(geometry),
            write_gate: Mutex::new(()),
            created: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Resumes from an existing container at `path`.
    ///
    /// Re-derives `chunks_written` by walking the body once: any trailing
    /// record that doesn't have `4 + expected_len` bytes remaining is
    /// treated as a crash-truncated tail and dropped (`cur_chunk_pos` is
    /// decremented back to the last intact record).
    ///
    /// If `force_options_folder` is false, `options.folder`/`part_folder`
    /// are overridden by the values recorded in the header.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFormat`] if the magic is wrong or a header string is
    /// corrupt. [`Error::AlreadyExists`] if the completed path exists and
    /// `options.overwrite` is unset.
    pub fn open_existing(
        path: impl AsRef<Path>,
        force_options_folder: bool,
        mut options: Options,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut probe = ContainerStore::open_read_only(path)?;
        let (header, headers_size) = Header::read_from(&mut probe)?;
        drop(probe);

        if !force_options_folder {
            options.folder = Some(PathBuf::from(&header.folder));
            options.part_folder = Some(PathBuf::from(&header.part_folder));
        }
        if let Some(ext) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(&header.filename))
        {
            options.part_extension = ext.to_string();
        }

        let folder = options.resolved_folder();
        let completed_path = folder.join(&header.filename);
        if completed_path.exists() {
            if !options.overwrite {
                return Err(Error::AlreadyExists { path: completed_path });
            }
            fs::remove_file(&completed_path)?;
        }
        if let Some(parent) = completed_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut geometry = GeometryState {
            size: header.size,
            headers_size,
            first_chunksize: header.first_chunksize,
            last_chunksize: header.last_chunksize,
            first_chunkpos: header.first_chunkpos,
            last_chunkpos: header.last_chunkpos,
            chunks_total: -1,
            partsize: -1,
        };
        geometry.refresh(header.chunksize)?;

        let index = ChunkIndex::new();
        let file_len = fs::metadata(path)?.len();
        let mut reader = ContainerStore::open_read_only(path)?;
        {
            use std::io::{Read, Seek, SeekFrom};
            reader.seek(SeekFrom::Start(headers_size))?;
            loop {
                let next_ordinal = index.cur_chunk_pos() + 1;
                let expected_len = if next_ordinal == header.first_chunkpos {
                    header.first_chunksize
                } else if next_ordinal == header.last_chunkpos {
                    header.last_chunksize
                } else {
                    header.chunksize as i64
                };
                let mut id_buf = [0u8; 4];
                if reader.read_exact(&mut id_buf).is_err() {
                    break; // clean EOF at a record boundary, nothing truncated
                }
                let mut payload = vec![0u8; expected_len.max(0) as usize];
                if reader.read_exact(&mut payload).is_err() {
                    break; // truncated tail: drop this ordinal, stop walking
                }
                let chunk_id = u32::from_le_bytes(id_buf) as u64;
                index
                    .insert_next(chunk_id)
                    .expect("sequential resume walk assigns each ordinal exactly once");
            }
        }

        let store = ContainerStore::open_for_resume(path)?;

        let part = Self {
            filename: header.filename.clone(),
            chunksize: header.chunksize,
            completed_path,
            options,
            store,
            index,
            geometry: Mutex::new(geometry),
            write_gate: Mutex::new(()),
            created: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        };

        if part.options.auto_create {
            let determined_and_complete = {
                let g = part.geometry.lock().unwrap();
                g.chunks_total >= 0 && file_len == g.partsize as u64
            };
            if determined_and_complete {
                part.create()?;
            }
        }

        Ok(part)
    }

    fn emit(&self, event: Event) {
        events::emit(self.options.on_event.as_ref(), event);
    }

    fn warn(&self, message: String) {
        self.emit(Event::Warning {
            filename: self.filename.clone(),
            message,
        });
    }

    /// Writes a middle chunk (not the logical first or last) of exactly
    /// `chunksize` bytes.
    ///
    /// Non-fatal by contract: if the partfile is already `created` or
    /// `chunk_id` is already indexed, emits [`Event::Warning`] and returns
    /// `Ok(())` without mutating anything.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `buf.len() != chunksize`.
    pub fn write(&self, chunk_id: u64, buf: &[u8]) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap();
        if self.created.load(Ordering::Acquire) {
            self.warn(format!(
                "write to chunk {chunk_id} ignored: partfile already created"
            ));
            return Ok(());
        }
        if self.index.contains(chunk_id) {
            self.warn(format!("duplicate write ignored for chunk {chunk_id}"));
            return Ok(());
        }
        if buf.len() as u32 != self.chunksize {
            return Err(Error::InvalidArgument {
                field: "buf",
                message: format!(
                    "{}: middle chunk must be exactly {} bytes, got {}",
                    self.filename,
                    self.chunksize,
                    buf.len()
                ),
            });
        }
        self.append_and_index(chunk_id, buf)?;
        self.maybe_auto_create_locked()?;
        Ok(())
    }

    /// Writes the logical first chunk (id 0). Patches the header's
    /// `first_chunkpos`/`first_chunksize` fields before the payload is
    /// appended, then seeks back to end-of-file (see `spec.md` §4.4, §9
    /// open question 1).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `buf.len() > chunksize`.
    pub fn write_first(&self, buf: &[u8]) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap();
        if self.created.load(Ordering::Acquire) {
            self.warn("write_first ignored: partfile already created".to_string());
            return Ok(());
        }
        if self.index.contains(0) {
            self.warn("duplicate write ignored for chunk 0".to_string());
            return Ok(());
        }
        let len = buf.len() as i64;
        if len > self.chunksize as i64 {
            return Err(Error::InvalidArgument {
                field: "buf",
                message: format!(
                    "{}: first chunk of {len} bytes exceeds chunksize {}",
                    self.filename, self.chunksize
                ),
            });
        }
        let next_ordinal = self.index.cur_chunk_pos() + 1;
        self.store
            .patch_boundary(header::OFF_FIRST_CHUNKPOS, next_ordinal, len)?;
        self.append_and_index(0, buf)?;
        {
            let mut g = self.geometry.lock().unwrap();
            g.first_chunkpos = next_ordinal;
            g.first_chunksize = len;
            g.refresh(self.chunksize)?;
        }
        self.maybe_auto_create_locked()?;
        Ok(())
    }

    /// Writes the logical last chunk. `chunk_id == 0` (single-chunk file)
    /// delegates to [`Self::write_first`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `buf.len() > chunksize`.
    pub fn write_last(&self, chunk_id: u64, buf: &[u8]) -> Result<()> {
        if chunk_id == 0 {
            return self.write_first(buf);
        }
        let _gate = self.write_gate.lock().unwrap();
        if self.created.load(Ordering::Acquire) {
            self.warn(format!(
                "write_last to chunk {chunk_id} ignored: partfile already created"
            ));
            return Ok(());
        }
        if self.index.contains(chunk_id) {
            self.warn(format!("duplicate write ignored for chunk {chunk_id}"));
            return Ok(());
        }
        let len = buf.len() as i64;
        if len > self.chunksize as i64 {
            return Err(Error::InvalidArgument {
                field: "buf",
                message: format!(
                    "{}: last chunk of {len} bytes exceeds chunksize {}",
                    self.filename, self.chunksize
                ),
            });
        }
        let next_ordinal = self.index.cur_chunk_pos() + 1;
        self.store
            .patch_boundary(header::OFF_LAST_CHUNKPOS, next_ordinal, len)?;
        self.append_and_index(chunk_id, buf)?;
        {
            let mut g = self.geometry.lock().unwrap();
            g.last_chunkpos = next_ordinal;
            g.last_chunksize = len;
            g.refresh(self.chunksize)?;
        }
        self.maybe_auto_create_locked()?;
        Ok(())
    }

    fn append_and_index(&self, chunk_id: u64, buf: &[u8]) -> Result<()> {
        self.store
            .append_record(chunk_id as u32, buf, self.options.flush_on_every_chunk)?;
        // The payload is durable on disk (flushed, if configured) before the
        // index entry is published; readers check the index before the file.
        self.index
            .insert_next(chunk_id)
            .expect("duplicate already rejected by caller under write_gate");
        Ok(())
    }

    /// Called with `write_gate` already held.
    fn maybe_auto_create_locked(&self) -> Result<()> {
        if !self.options.auto_create {
            return Ok(());
        }
        let partsize = {
            let g = self.geometry.lock().unwrap();
            if g.chunks_total < 0 {
                return Ok(());
            }
            g.partsize
        };
        if self.store.file_len()? == partsize as u64 {
            self.create_locked()?;
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes of logical file content starting at
    /// byte `pos`. `count` is clamped to `size - pos` when `size` is known.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] if the first chunk size is still unknown.
    /// [`Error::MissingChunk`] if a touched chunk has not been written yet.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::NotSupported {
                operation: "read on a disposed partfile",
            });
        }
        let g = *self.geometry.lock().unwrap();
        let mut count = buf.len() as u64;
        if g.size >= 0 {
            if pos >= g.size as u64 {
                return Ok(0);
            }
            count = count.min(g.size as u64 - pos);
        }
        if count == 0 {
            return Ok(0);
        }

        if self.created.load(Ordering::Acquire) {
            self.store.read_at(pos, &mut buf[..count as usize])?;
            return Ok(count as usize);
        }

        if g.first_chunksize < 0 {
            return Err(Error::NotReady {
                message: format!("{}: first chunk size unknown", self.filename),
            });
        }

        let first_chunksize = g.first_chunksize as u64;
        let mut total = 0u64;
        let mut cur = pos;
        while total < count {
            let chunk_id = if cur < first_chunksize {
                0
            } else {
                (cur - first_chunksize) / self.chunksize as u64 + 1
            };
            let start_byte = if chunk_id == 0 {
                cur
            } else {
                (cur - first_chunksize) % self.chunksize as u64
            };
            let capacity = geometry::capacity_of(
                chunk_id,
                g.chunks_total,
                g.first_chunksize,
                g.last_chunksize,
                self.chunksize,
            );
            let want = (count - total).min(capacity - start_byte);
            let chunk_pos = self
                .index
                .get(chunk_id)
                .ok_or(Error::MissingChunk { chunk_id })?;
            let offset = geometry::chunk_payload_offset(
                g.headers_size,
                self.chunksize,
                g.first_chunksize,
                g.first_chunkpos,
                g.last_chunksize,
                g.last_chunkpos,
                chunk_pos,
            ) + start_byte;
            self.store
                .read_at(offset, &mut buf[total as usize..(total + want) as usize])?;
            total += want;
            cur += want;
        }
        Ok(total as usize)
    }

    /// Reads up to `buf.len()` bytes from within a single logical chunk,
    /// starting at `start_byte` within that chunk's payload.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] if the first chunk size is still unknown.
    /// [`Error::MissingChunk`] if this chunk has not been written yet.
    pub fn read_chunk(&self, chunk_id: u64, start_byte: u64, buf: &mut [u8]) -> Result<usize> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::NotSupported {
                operation: "read on a disposed partfile",
            });
        }
        let g = *self.geometry.lock().unwrap();
        if self.created.load(Ordering::Acquire) {
            let logical_pos = if chunk_id == 0 {
                0
            } else {
                g.first_chunksize as u64 + (chunk_id - 1) * self.chunksize as u64
            };
            return self.read_at(logical_pos + start_byte, buf);
        }
        if g.first_chunksize < 0 {
            return Err(Error::NotReady {
                message: format!("{}: first chunk size unknown", self.filename),
            });
        }
        let capacity = geometry::capacity_of(
            chunk_id,
            g.chunks_total,
            g.first_chunksize,
            g.last_chunksize,
            self.chunksize,
        );
        if start_byte >= capacity {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(capacity - start_byte);
        let chunk_pos = self
            .index
            .get(chunk_id)
            .ok_or(Error::MissingChunk { chunk_id })?;
        let offset = geometry::chunk_payload_offset(
            g.headers_size,
            self.chunksize,
            g.first_chunksize,
            g.first_chunkpos,
            g.last_chunksize,
            g.last_chunkpos,
            chunk_pos,
        ) + start_byte;
        self.store.read_at(offset, &mut buf[..want as usize])?;
        Ok(want as usize)
    }

    /// Materializes `folder/filename` from the container. Idempotent: a
    /// second call is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::MissingChunk`] if any logical chunk has not been written
    /// yet. [`Error::NotReady`] if geometry is still undetermined.
    pub fn create(&self) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap();
        self.create_locked()
    }

    /// Called with `write_gate` already held.
    fn create_locked(&self) -> Result<()> {
        if self.created.load(Ordering::Acquire) {
            return Ok(());
        }
        self.emit(Event::FileCreating {
            filename: self.filename.clone(),
        });

        let g = *self.geometry.lock().unwrap();
        if g.chunks_total < 0 {
            return Err(Error::NotReady {
                message: format!("{}: geometry undetermined, cannot create", self.filename),
            });
        }

        if let Some(parent) = self.completed_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.completed_path)?;

        let mut buf = vec![0u8; self.chunksize as usize];
        for id in 0..g.chunks_total as u64 {
            let cap = geometry::capacity_of(
                id,
                g.chunks_total,
                g.first_chunksize,
                g.last_chunksize,
                self.chunksize,
            ) as usize;
            let chunk_pos = self.index.get(id).ok_or(Error::MissingChunk { chunk_id: id })?;
            let offset = geometry::chunk_payload_offset(
                g.headers_size,
                self.chunksize,
                g.first_chunksize,
                g.first_chunkpos,
                g.last_chunksize,
                g.last_chunkpos,
                chunk_pos,
            );
            self.store.read_at(offset, &mut buf[..cap])?;
            target.write_all(&buf[..cap])?;
        }
        target.flush()?;
        drop(target);

        self.store.close_write()?;
        self.created.store(true, Ordering::Release);

        if self.options.delete_part_on_create {
            self.store.close_read()?;
            self.store.delete()?;
        }

        self.emit(Event::FileCreated {
            filename: self.filename.clone(),
        });

        if self.options.stay_alive {
            self.store.swap_read_handle(&self.completed_path)?;
        } else {
            self.dispose_locked()?;
        }
        Ok(())
    }

    /// Idempotent. Flushes/closes the write handle, closes the read handle,
    /// and deletes the completed and/or container files per `options`.
    pub fn dispose(&self) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap();
        self.dispose_locked()
    }

    /// Called with `write_gate` already held.
    fn dispose_locked(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.close_write()?;
        self.store.close_read()?;
        if self.options.delete_part_on_dispose {
            self.store.delete()?;
        }
        if self.options.delete_on_dispose {
            match fs::remove_file(&self.completed_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// A positional, read-only sequential view over this partfile.
    pub fn get_read_stream(&self) -> PartStream<'_> {
        PartStream::new(self)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn chunksize(&self) -> u32 {
        self.chunksize
    }

    pub fn size(&self) -> i64 {
        self.geometry.lock().unwrap().size
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    pub fn disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn partsize(&self) -> i64 {
        self.geometry.lock().unwrap().partsize
    }

    pub fn chunks_written(&self) -> u64 {
        self.index.chunks_written()
    }

    pub fn chunks_total(&self) -> i64 {
        self.geometry.lock().unwrap().chunks_total
    }

    pub fn first_chunkpos(&self) -> i64 {
        self.geometry.lock().unwrap().first_chunkpos
    }

    pub fn last_chunkpos(&self) -> i64 {
        self.geometry.lock().unwrap().last_chunkpos
    }

    pub fn chunk_index(&self) -> Vec<(u64, u64)> {
        self.index.snapshot()
    }

    /// Path of the completed file (`folder/filename`).
    pub fn completed_path(&self) -> &Path {
        &self.completed_path
    }

    /// Path of the container file (`part_folder/filename + part_extension`).
    pub fn container_path(&self) -> &Path {
        self.store.path()
    }
}

impl Drop for Partfile {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}
