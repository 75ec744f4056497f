//! Backing store of an application image.

use super::elf::ElfError;

/// Positional reads from an application image.
///
/// Implementations return how many bytes were actually copied into `dest`.
/// Host I/O failures surface as a short read; the loader turns every short
/// read into [`ElfError::Io`].
pub trait ImageSource {
    /// Read up to `dest.len()` bytes starting at `offset`.
    fn pread(&mut self, dest: &mut [u8], offset: u64) -> usize;
}

/// In-memory images (a byte slice, a `Vec<u8>`, a static blob).
impl<T: AsRef<[u8]> + ?Sized> ImageSource for T {
    fn pread(&mut self, dest: &mut [u8], offset: u64) -> usize {
        let bytes = self.as_ref();
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= bytes.len() {
            return 0;
        }
        let n = core::cmp::min(dest.len(), bytes.len() - start);
        dest[..n].copy_from_slice(&bytes[start..start + n]);
        n
    }
}

/// Fill `dest` completely from `offset`, or fail with [`ElfError::Io`].
pub fn read_exact_at<S: ImageSource + ?Sized>(
    source: &mut S,
    dest: &mut [u8],
    offset: u64,
) -> Result<(), ElfError> {
    if source.pread(dest, offset) != dest.len() {
        return Err(ElfError::Io);
    }
    Ok(())
}
