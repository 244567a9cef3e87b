//! `partfile`: a resumable partial-file container.
//!
//! A single on-disk container file accumulates out-of-order, fixed-size
//! chunks of some logical target file as they arrive from an external
//! producer, serves random-access reads against that logical file while it
//! is still incomplete, and materializes into a contiguous completed file
//! once every chunk is present.
//!
//! The crate is deliberately narrow: it has no opinion on how chunks are
//! acquired (network, peer exchange, local splitting — anything), no CLI,
//! and no integrity checking of chunk payloads. See [`Partfile`] for the
//! primary entry point.

pub mod container;
pub mod error;
pub mod events;
pub mod options;
pub mod partfile;
pub mod stream;

pub use crate::error::{Error, Result};
pub use crate::events::{Event, EventSink};
pub use crate::options::Options;
pub use crate::partfile::Partfile;
pub use crate::stream::{PartStream, SeekFrom};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::{Event, EventSink};
    pub use crate::options::Options;
    pub use crate::partfile::Partfile;
    pub use crate::stream::{PartStream, SeekFrom};
}
