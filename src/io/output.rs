use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

use super::{aligned_len, AlignedBuf};

fn not_open(op: &'static str) -> Error {
    Error::Io {
        op,
        source: io::Error::new(io::ErrorKind::NotConnected, "file is not open"),
    }
}

/// A write-side file handle that stages data in a sector-aligned bounce
/// buffer and only issues full-buffer kernel writes, compatible with
/// `O_DIRECT`.
///
/// [`total_written`](FileOutput::total_written) tracks the logical byte
/// count. Under direct I/O the final [`close`](FileOutput::close) pads the
/// last partial buffer to a sector multiple, writes it, then truncates the
/// file back to the logical length.
pub struct FileOutput {
    file: Option<File>,
    buffer: AlignedBuf,
    /// Fill position within the bounce buffer.
    pos: usize,
    /// Logical bytes accepted, which transiently differs from the
    /// kernel-visible file length under direct I/O.
    total_written: u64,
    direct_io: bool,
}

impl FileOutput {
    /// Creates a handle with a bounce buffer of at least `buffer_size`
    /// bytes, rounded up to a sector multiple.
    pub fn new(buffer_size: usize) -> Result<Self> {
        Ok(Self {
            file: None,
            buffer: AlignedBuf::new(aligned_len(buffer_size))?,
            pos: 0,
            total_written: 0,
            direct_io: false,
        })
    }

    /// Creates or truncates a file for writing, mode 0644. Fails with
    /// [`Error::AlreadyOpen`] if this handle already has a file.
    pub fn open(&mut self, path: impl AsRef<Path>, direct_io: bool) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o644);
        if direct_io {
            options.custom_flags(libc::O_DIRECT);
        }
        let file = options.open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.file = Some(file);
        self.direct_io = direct_io;
        self.pos = 0;
        self.total_written = 0;
        Ok(())
    }

    /// Logical bytes written so far.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Writes the buffered bytes to the file. Only called with a full
    /// buffer while the file is open for direct I/O; a partial tail is
    /// handled by `close`.
    fn flush(&mut self) -> Result<()> {
        if self.pos == 0 {
            return Ok(());
        }
        let file = self.file.as_mut().ok_or_else(|| not_open("write"))?;
        file.write_all(&self.buffer[..self.pos])
            .map_err(|source| Error::Io {
                op: "write",
                source,
            })?;
        self.pos = 0;
        Ok(())
    }

    /// Appends `data`, staging through the bounce buffer and flushing
    /// whenever it fills.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.file.is_none() {
            return Err(not_open("write"));
        }
        let mut remaining = data;
        while !remaining.is_empty() {
            let space = self.buffer.capacity() - self.pos;
            let take = remaining.len().min(space);
            self.buffer[self.pos..self.pos + take].copy_from_slice(&remaining[..take]);
            self.pos += take;
            remaining = &remaining[take..];
            if self.pos == self.buffer.capacity() {
                self.flush()?;
            }
        }
        self.total_written += data.len() as u64;
        Ok(())
    }

    /// Writes one little-endian u64.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write(&buf)
    }

    /// Writes an 8-byte length followed by the bytes themselves.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write_u64(data.len() as u64)?;
        self.write(data)
    }

    /// Flushes any remaining data and closes the file. Idempotent.
    ///
    /// Under direct I/O the partial tail is zero-padded to a sector
    /// multiple, written, and the file is truncated back to the logical
    /// length, so the padding is only ever transiently on disk.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }

        if self.direct_io {
            if self.pos > 0 {
                let padded = aligned_len(self.pos);
                self.buffer[self.pos..padded].fill(0);
                let file = self.file.as_mut().ok_or_else(|| not_open("write"))?;
                file.write_all(&self.buffer[..padded])
                    .map_err(|source| Error::Io {
                        op: "write",
                        source,
                    })?;
                self.pos = 0;
            }
            let file = self.file.as_ref().ok_or_else(|| not_open("ftruncate"))?;
            file.set_len(self.total_written)
                .map_err(|source| Error::Io {
                    op: "ftruncate",
                    source,
                })?;
        } else {
            self.flush()?;
        }
        self.file = None;
        Ok(())
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
