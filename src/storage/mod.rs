//! Staging Partition Storage
//!
//! Window onto the secondary flash slot where an incoming image is staged.
//! The store itself only enforces bounds and device alignment; sequencing
//! (strictly increasing write offsets, capacity checks) is the controller's job.
//!
//! Writes go through a word-aligned RAM buffer: the SoftDevice flash API
//! programs whole words and requires its source in RAM.

use core::fmt;

use embedded_storage_async::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

use crate::log::{debug, info, warn};

pub mod trailer;

/// Program granularity for the terminal chunk padding
pub const WORD_SIZE: usize = 4;

/// Erased-state fill used for padding
pub const ERASED_BYTE: u8 = 0xFF;

/// Bytes programmed per device write
const PROGRAM_BLOCK: usize = 256;

#[repr(C, align(4))]
struct ProgramBuffer([u8; PROGRAM_BLOCK]);

/// Flash region reserved for staging, in absolute device addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Partition {
    pub offset: u32,
    pub size: u32,
}

impl Partition {
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    pub const fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Storage operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageOp {
    Open,
    Erase,
    Write,
    Read,
}

/// Device error tagged with the operation that hit it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageError {
    pub op: StorageOp,
    pub kind: NorFlashErrorKind,
}

impl StorageError {
    pub fn new(op: StorageOp, kind: NorFlashErrorKind) -> Self {
        Self { op, kind }
    }

    fn device<E: NorFlashError>(op: StorageOp) -> impl FnOnce(E) -> Self {
        move |err| Self::new(op, err.kind())
    }
}

fn kind_name(kind: NorFlashErrorKind) -> &'static str {
    match kind {
        NorFlashErrorKind::NotAligned => "not aligned",
        NorFlashErrorKind::OutOfBounds => "out of bounds",
        _ => "device error",
    }
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Erase => "erase",
            Self::Write => "write",
            Self::Read => "read",
        };
        f.write_str(name)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.op, kind_name(self.kind))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StorageError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} failed: {}", self.op, kind_name(self.kind))
    }
}

/// Length actually programmed for a chunk.
///
/// The chunk that completes the image is padded up to the next word when its
/// length is not word-aligned: `4 * (len / 4 + 1)`. Other chunks are written
/// as-is.
pub fn program_len(len: usize, terminal: bool) -> usize {
    if terminal && len % WORD_SIZE != 0 {
        WORD_SIZE * (len / WORD_SIZE + 1)
    } else {
        len
    }
}

/// Staging slot on top of an async NOR flash
pub struct StagingStore<F> {
    flash: F,
    partition: Partition,
}

impl<F: NorFlash> StagingStore<F> {
    /// Claim `partition` on `flash`.
    ///
    /// The partition must be erase-page aligned, lie inside the device and
    /// hold at least one image page plus the trailer page.
    pub fn open(flash: F, partition: Partition) -> Result<Self, StorageError> {
        let page = F::ERASE_SIZE as u32;
        let open_err = |kind| StorageError::new(StorageOp::Open, kind);

        if page == 0 || partition.offset % page != 0 || partition.size % page != 0 {
            warn!("Storage: partition at 0x{:08X} is not page aligned", partition.offset);
            return Err(open_err(NorFlashErrorKind::NotAligned));
        }
        if F::WRITE_SIZE == 0 || WORD_SIZE % F::WRITE_SIZE != 0 {
            return Err(open_err(NorFlashErrorKind::NotAligned));
        }
        if partition.size < 2 * page {
            return Err(open_err(NorFlashErrorKind::OutOfBounds));
        }
        match partition.offset.checked_add(partition.size) {
            Some(end) if end as usize <= flash.capacity() => {}
            _ => {
                warn!("Storage: partition at 0x{:08X} exceeds the device", partition.offset);
                return Err(open_err(NorFlashErrorKind::OutOfBounds));
            }
        }

        info!(
            "Storage: staging partition 0x{:08X}..0x{:08X}",
            partition.offset,
            partition.end()
        );
        Ok(Self { flash, partition })
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Bytes available for an image. The last page is kept for the trailer.
    pub fn capacity(&self) -> u32 {
        self.partition.size - F::ERASE_SIZE as u32
    }

    /// Erase the pages covering the first `len` bytes of the slot
    pub async fn erase(&mut self, len: u32) -> Result<(), StorageError> {
        if len > self.capacity() {
            return Err(StorageError::new(StorageOp::Erase, NorFlashErrorKind::OutOfBounds));
        }
        let page = F::ERASE_SIZE as u32;
        let span = len.div_ceil(page) * page;
        if span == 0 {
            return Ok(());
        }

        debug!("Storage: erasing {} bytes", span);
        self.flash
            .erase(self.partition.offset, self.partition.offset + span)
            .await
            .map_err(StorageError::device(StorageOp::Erase))
    }

    /// Program `chunk` at `offset` within the slot.
    ///
    /// `terminal` marks the chunk that completes the image; see [`program_len`].
    /// Returns the number of bytes programmed.
    pub async fn write(&mut self, offset: u32, chunk: &[u8], terminal: bool) -> Result<usize, StorageError> {
        let total = program_len(chunk.len(), terminal);
        let fits = (offset as usize)
            .checked_add(total)
            .is_some_and(|end| end <= self.capacity() as usize);
        if !fits {
            return Err(StorageError::new(StorageOp::Write, NorFlashErrorKind::OutOfBounds));
        }

        let mut buffer = ProgramBuffer([ERASED_BYTE; PROGRAM_BLOCK]);
        let mut done = 0;
        while done < total {
            let span = (total - done).min(PROGRAM_BLOCK);
            let copied = chunk.len().min(done + span) - done;
            buffer.0[..copied].copy_from_slice(&chunk[done..done + copied]);
            buffer.0[copied..span].fill(ERASED_BYTE);

            let address = self.partition.offset + offset + done as u32;
            self.flash
                .write(address, &buffer.0[..span])
                .await
                .map_err(StorageError::device(StorageOp::Write))?;
            done += span;
        }

        Ok(total)
    }

    /// Read `buf.len()` bytes starting at `offset` within the slot
    pub async fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let fits = (offset as usize)
            .checked_add(buf.len())
            .is_some_and(|end| end <= self.partition.size as usize);
        if !fits {
            return Err(StorageError::new(StorageOp::Read, NorFlashErrorKind::OutOfBounds));
        }

        self.flash
            .read(self.partition.offset + offset, buf)
            .await
            .map_err(StorageError::device(StorageOp::Read))
    }

    /// Flag the staged image for the bootloader: rewrite the trailer page with
    /// the boot magic at the end of the slot.
    pub async fn mark_pending(&mut self) -> Result<(), StorageError> {
        let trailer_page = self.partition.offset + self.capacity();
        self.flash
            .erase(trailer_page, self.partition.end())
            .await
            .map_err(StorageError::device(StorageOp::Erase))?;

        let mut magic = ProgramBuffer([ERASED_BYTE; PROGRAM_BLOCK]);
        magic.0[..trailer::BOOT_MAGIC_LEN].copy_from_slice(&trailer::BOOT_MAGIC);
        let address = self.partition.offset + trailer::magic_offset(self.partition.size);
        self.flash
            .write(address, &magic.0[..trailer::BOOT_MAGIC_LEN])
            .await
            .map_err(StorageError::device(StorageOp::Write))?;

        info!("Storage: image marked pending at 0x{:08X}", address);
        Ok(())
    }

    /// Release the flash device
    pub fn close(self) -> F {
        self.flash
    }
}
