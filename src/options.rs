use std::fmt;
use std::path::PathBuf;

use crate::events::EventSink;

/// Value-type configuration for a [`crate::Partfile`], cloned on construction.
///
/// `Options` carries only configuration; it is never mutated in place after
/// the partfile is constructed. Boundary chunk sizes discovered at runtime
/// (once the first or last chunk is actually written) live on `Partfile`
/// itself, not here (see `DESIGN.md`).
#[derive(Clone)]
pub struct Options {
    /// Destination directory for the completed file. `None` means the
    /// current working directory, resolved when the partfile is opened.
    pub folder: Option<PathBuf>,
    /// Directory for the container file. `None` means the OS temp directory.
    pub part_folder: Option<PathBuf>,
    /// Suffix appended to `filename` to form the container path.
    pub part_extension: String,
    /// Permit deleting a pre-existing completed file.
    pub overwrite: bool,
    /// Permit deleting a pre-existing container file.
    pub part_overwrite: bool,
    /// Synthesize the completed file once `partsize` is reached.
    pub auto_create: bool,
    /// Delete the completed file when the partfile is disposed.
    pub delete_on_dispose: bool,
    /// Delete the container file when the partfile is disposed.
    pub delete_part_on_dispose: bool,
    /// Delete the container file immediately after `create()` succeeds.
    pub delete_part_on_create: bool,
    /// Keep a read-only handle to the completed file open after `create()`.
    pub stay_alive: bool,
    /// Known first-chunk length, or `-1` if unknown in advance.
    pub first_chunksize: i64,
    /// Known last-chunk length, or `-1` if unknown in advance.
    pub last_chunksize: i64,
    /// Flush the write handle after every chunk append.
    pub flush_on_every_chunk: bool,
    /// Lifecycle observer; see [`crate::events::Event`].
    pub on_event: Option<EventSink>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            folder: None,
            part_folder: None,
            part_extension: ".apf".to_string(),
            overwrite: false,
            part_overwrite: false,
            auto_create: true,
            delete_on_dispose: false,
            delete_part_on_dispose: false,
            delete_part_on_create: true,
            stay_alive: true,
            first_chunksize: -1,
            last_chunksize: -1,
            flush_on_every_chunk: false,
            on_event: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("folder", &self.folder)
            .field("part_folder", &self.part_folder)
            .field("part_extension", &self.part_extension)
            .field("overwrite", &self.overwrite)
            .field("part_overwrite", &self.part_overwrite)
            .field("auto_create", &self.auto_create)
            .field("delete_on_dispose", &self.delete_on_dispose)
            .field("delete_part_on_dispose", &self.delete_part_on_dispose)
            .field("delete_part_on_create", &self.delete_part_on_create)
            .field("stay_alive", &self.stay_alive)
            .field("first_chunksize", &self.first_chunksize)
            .field("last_chunksize", &self.last_chunksize)
            .field("flush_on_every_chunk", &self.flush_on_every_chunk)
            .field("on_event", &self.on_event.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Options {
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_part_folder(mut self, part_folder: impl Into<PathBuf>) -> Self {
        self.part_folder = Some(part_folder.into());
        self
    }

    pub fn with_part_extension(mut self, part_extension: impl Into<String>) -> Self {
        self.part_extension = part_extension.into();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_part_overwrite(mut self, part_overwrite: bool) -> Self {
        self.part_overwrite = part_overwrite;
        self
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    pub fn with_delete_on_dispose(mut self, delete_on_dispose: bool) -> Self {
        self.delete_on_dispose = delete_on_dispose;
        self
    }

    pub fn with_delete_part_on_dispose(mut self, delete_part_on_dispose: bool) -> Self {
        self.delete_part_on_dispose = delete_part_on_dispose;
        self
    }

    pub fn with_delete_part_on_create(mut self, delete_part_on_create: bool) -> Self {
        self.delete_part_on_create = delete_part_on_create;
        self
    }

    pub fn with_stay_alive(mut self, stay_alive: bool) -> Self {
        self.stay_alive = stay_alive;
        self
    }

    pub fn with_first_chunksize(mut self, first_chunksize: i64) -> Self {
        self.first_chunksize = first_chunksize;
        self
    }

    pub fn with_last_chunksize(mut self, last_chunksize: i64) -> Self {
        self.last_chunksize = last_chunksize;
        self
    }

    pub fn with_flush_on_every_chunk(mut self, flush_on_every_chunk: bool) -> Self {
        self.flush_on_every_chunk = flush_on_every_chunk;
        self
    }

    pub fn with_on_event(mut self, on_event: EventSink) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub(crate) fn resolved_folder(&self) -> PathBuf {
        self.folder
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub(crate) fn resolved_part_folder(&self) -> PathBuf {
        self.part_folder.clone().unwrap_or_else(std::env::temp_dir)
    }
}
