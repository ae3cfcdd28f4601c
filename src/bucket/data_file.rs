use std::fs::{File, OpenOptions};
use std::io::SeekFrom;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::corruption;
use crate::error::{Error, Result};
use crate::hasher::Checksum;
use crate::io::{AlignedBuf, FileInput, SECTOR_SIZE};

use super::page::pages_for;
use super::trailer::{Trailer, TRAILER_SIZE};

/// A sealed data file: an open read descriptor plus the metadata needed
/// to drive lookups. Neither region of the file is ever modified after
/// sealing; the handle is released on drop and the on-disk file remains.
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    file: File,
    entries_count: u64,
    byte_size: u64,
    checksum: u64,
}

impl DataFile {
    /// Opens a sealed data file, validating its trailer and geometry.
    pub fn open(path: impl Into<PathBuf>, direct_io: bool) -> Result<Self> {
        let path = path.into();
        let mut options = OpenOptions::new();
        options.read(true);
        if direct_io {
            options.custom_flags(libc::O_DIRECT);
        }
        let file = options.open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;

        let byte_size = file
            .metadata()
            .map_err(|source| Error::Io {
                op: "stat",
                source,
            })?
            .len();
        if byte_size < TRAILER_SIZE as u64 || byte_size % SECTOR_SIZE as u64 != 0 {
            return Err(corruption!(
                "{}: size {byte_size} cannot hold a trailer",
                path.display()
            ));
        }

        let mut input = FileInput::new(SECTOR_SIZE)?;
        input.attach(&file, direct_io)?;
        let mut sector = AlignedBuf::new(TRAILER_SIZE)?;
        let got = input.pread(&mut sector, byte_size - TRAILER_SIZE as u64)?;
        if got != TRAILER_SIZE {
            return Err(Error::ShortRead {
                expected: TRAILER_SIZE,
                got,
            });
        }
        let trailer = Trailer::decode(&sector)?;

        let index_bytes = pages_for(trailer.entries_count) * SECTOR_SIZE as u64;
        if index_bytes + TRAILER_SIZE as u64 > byte_size {
            return Err(corruption!(
                "{}: {} entries need a {index_bytes}-byte index but the file \
                 holds {byte_size} bytes",
                path.display(),
                trailer.entries_count
            ));
        }

        Ok(Self {
            path,
            file,
            entries_count: trailer.entries_count,
            byte_size,
            checksum: trailer.checksum,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shared read descriptor; positional reads only.
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn entries_count(&self) -> u64 {
        self.entries_count
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Byte offset of the index region.
    pub fn index_offset(&self) -> u64 {
        self.byte_size
            - TRAILER_SIZE as u64
            - pages_for(self.entries_count) * SECTOR_SIZE as u64
    }

    /// Replays the record region and compares the rolling checksum with
    /// the trailer. An explicit scrub, not part of `open`.
    pub fn verify_checksum(&self) -> Result<()> {
        let mut input = FileInput::new(SECTOR_SIZE)?;
        input.attach(&self.file, false)?;
        input.seek(SeekFrom::Start(0))?;

        let mut checksum = Checksum::new();
        for _ in 0..self.entries_count {
            let record = super::record::Record::read_from(&mut input)?;
            checksum.update(&record.key, &record.value);
        }
        if checksum.value() != self.checksum {
            return Err(corruption!(
                "{}: checksum mismatch: computed {:#x}, stored {:#x}",
                self.path.display(),
                checksum.value(),
                self.checksum
            ));
        }
        Ok(())
    }
}
