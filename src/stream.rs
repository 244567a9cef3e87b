//! Read stream adapter (C7): a positional, read-only sequential view over a
//! [`Partfile`]. Mirrors the shape of the teacher's `read::stream::FileReader`
//! — a thin cursor that delegates the actual I/O back to its owner — but the
//! cursor here is pure local arithmetic (`seek` never touches the partfile)
//! rather than a chunk-boundary walk.

use crate::error::{Error, Result};
use crate::partfile::Partfile;

/// Seek origin for [`PartStream::seek`]. `End(offset)` is interpreted as
/// `length - offset`, exactly — not `length - |offset|` — matching
/// `spec.md` §4.5 precisely.
#[derive(Clone, Copy, Debug)]
pub enum SeekFrom {
    Begin(i64),
    Current(i64),
    End(i64),
}

/// A read-only cursor over a [`Partfile`]'s logical byte range. Construct
/// via [`Partfile::get_read_stream`].
pub struct PartStream<'a> {
    partfile: &'a Partfile,
    position: u64,
}

impl<'a> PartStream<'a> {
    pub(crate) fn new(partfile: &'a Partfile) -> Self {
        Self { partfile, position: 0 }
    }

    /// The logical length of the underlying partfile, or `-1` if unknown.
    pub fn length(&self) -> i64 {
        self.partfile.size()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads into `buf` starting at the current position and advances the
    /// cursor by the number of bytes actually read.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Partfile::read_at`] returns.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.partfile.read_at(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Write operations are not supported on a read-only stream.
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::NotSupported {
            operation: "write on a read-only PartStream",
        })
    }

    /// Pure arithmetic on the local cursor; never touches the partfile.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the resulting position would be
    /// negative.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        let new_pos = match from {
            SeekFrom::Begin(offset) => offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
            SeekFrom::End(offset) => self.length() - offset,
        };
        if new_pos < 0 {
            return Err(Error::InvalidArgument {
                field: "offset",
                message: format!("seek would move to negative position {new_pos}"),
            });
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl<'a> std::io::Read for PartStream<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        PartStream::read(self, buf).map_err(|e| std::io::Error::other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::partfile::Partfile;

    fn fixture() -> (tempfile::TempDir, Partfile) {
        let dir = tempfile::tempdir().unwrap();
        let options = Options::default()
            .with_folder(dir.path())
            .with_part_folder(dir.path())
            .with_auto_create(false);
        let pf = Partfile::open_new("s", 4, Some(12), options).unwrap();
        pf.write_first(&[1, 1, 1, 1]).unwrap();
        pf.write(1, &[2, 2, 2, 2]).unwrap();
        pf.write_last(2, &[3, 3, 3, 3]).unwrap();
        (dir, pf)
    }

    #[test]
    fn seek_end_is_exact_subtraction() {
        let (_dir, pf) = fixture();
        let mut s = pf.get_read_stream();
        assert_eq!(s.seek(SeekFrom::End(4)).unwrap(), 8);
        let mut buf = [0u8; 4];
        assert_eq!(s.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [3, 3, 3, 3]);
    }

    #[test]
    fn read_advances_position() {
        let (_dir, pf) = fixture();
        let mut s = pf.get_read_stream();
        let mut buf = [0u8; 4];
        assert_eq!(s.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 1, 1, 1]);
        assert_eq!(s.position(), 4);
        assert_eq!(s.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [2, 2, 2, 2]);
    }

    #[test]
    fn write_is_not_supported() {
        let (_dir, pf) = fixture();
        let mut s = pf.get_read_stream();
        assert!(matches!(
            s.write(&[0]).unwrap_err(),
            Error::NotSupported { .. }
        ));
    }

    #[test]
    fn negative_seek_is_rejected() {
        let (_dir, pf) = fixture();
        let mut s = pf.get_read_stream();
        assert!(s.seek(SeekFrom::Begin(-1)).is_err());
    }
}
