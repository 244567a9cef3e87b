use std::fmt;
use std::sync::Arc;

/// Lifecycle notifications fired by [`crate::Partfile`].
///
/// `FileCreating`/`FileCreated` bracket [`crate::Partfile::create`].
/// `Warning` fires in place of an error for two non-fatal conditions:
/// writing to an already-created partfile, and writing a chunk id that has
/// already been written.
#[derive(Clone)]
pub enum Event {
    FileCreating { filename: String },
    FileCreated { filename: String },
    Warning { filename: String, message: String },
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::FileCreating { filename } => {
                f.debug_struct("FileCreating").field("filename", filename).finish()
            }
            Event::FileCreated { filename } => {
                f.debug_struct("FileCreated").field("filename", filename).finish()
            }
            Event::Warning { filename, message } => f
                .debug_struct("Warning")
                .field("filename", filename)
                .field("message", message)
                .finish(),
        }
    }
}

/// Caller-supplied observer. Invoked synchronously; a panic inside the
/// callback is allowed to unwind into the caller of the `Partfile` method
/// that triggered it.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

pub(crate) fn emit(sink: Option<&EventSink>, event: Event) {
    match &event {
        Event::FileCreating { filename } => {
            tracing::debug!(filename, "partfile: creating completed file")
        }
        Event::FileCreated { filename } => {
            tracing::debug!(filename, "partfile: completed file created")
        }
        Event::Warning { filename, message } => {
            tracing::warn!(filename, message, "partfile: warning")
        }
    }
    if let Some(sink) = sink {
        sink(event);
    }
}
