//! Image Integrity Verification
//!
//! CRC-32/ISO-HDLC (reflected, polynomial 0xEDB88320, init 0xFFFFFFFF,
//! complemented output) over the staged image, read back from flash in
//! [`VERIFY_WINDOW`] sized windows. The bitwise `NoTable` variant keeps the
//! 1 KiB lookup table out of flash; the checksum is identical.

use crc::{Crc, NoTable, CRC_32_ISO_HDLC};
use embedded_storage_async::nor_flash::NorFlash;

use crate::config::VERIFY_WINDOW;
use crate::log::debug;
use crate::storage::{StagingStore, StorageError};

static CRC32: Crc<u32, NoTable> = Crc::<u32, NoTable>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of an in-memory buffer, as computed by the update client
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// CRC-32 of the first `len` staged bytes.
///
/// Any read failure aborts the whole computation.
pub async fn staged_crc32<F: NorFlash>(store: &mut StagingStore<F>, len: u32) -> Result<u32, StorageError> {
    let mut digest = CRC32.digest();
    let mut window = [0u8; VERIFY_WINDOW];
    let mut offset = 0u32;

    while offset < len {
        let span = ((len - offset) as usize).min(VERIFY_WINDOW);
        store.read(offset, &mut window[..span]).await?;
        digest.update(&window[..span]);
        offset += span as u32;
    }

    let crc = digest.finalize();
    debug!("Verify: CRC-32 over {} bytes = 0x{:08X}", len, crc);
    Ok(crc)
}
