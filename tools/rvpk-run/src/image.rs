//! Application images backed by a host file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use rvpk_kernel::loader::ImageSource;

/// An application image read through `Read + Seek`.
///
/// Host I/O failures are logged and reported to the loader as short reads.
pub struct FileImage<R> {
    inner: R,
    len: u64,
}

impl FileImage<BufReader<File>> {
    /// Open the image at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            len,
        })
    }
}

impl<R: Read + Seek> FileImage<R> {
    pub fn new(mut inner: R) -> std::io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    /// Image size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn read_at(&mut self, dest: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < dest.len() {
            match self.inner.read(&mut dest[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek> ImageSource for FileImage<R> {
    fn pread(&mut self, dest: &mut [u8], offset: u64) -> usize {
        if offset >= self.len {
            return 0;
        }
        match self.read_at(dest, offset) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("[ELF] image read of {} bytes at {:#x} failed: {}", dest.len(), offset, e);
                0
            }
        }
    }
}
