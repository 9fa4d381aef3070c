//! Boot trailer written at the end of the staging slot.
//!
//! Layout matches MCUboot's image trailer: the 16-byte magic occupies the last
//! bytes of the slot. A slot whose trailer carries the magic (and no
//! `image_ok`) is swapped in for a test boot on the next reset.

/// MCUboot trailer magic, little-endian words
/// 0xf395c277 0x7fefd260 0x0f505235 0x8079b62c
pub const BOOT_MAGIC: [u8; BOOT_MAGIC_LEN] = [
    0x77, 0xc2, 0x95, 0xf3, 0x60, 0xd2, 0xef, 0x7f, 0x35, 0x52, 0x50, 0x0f, 0x2c, 0xb6, 0x79, 0x80,
];

pub const BOOT_MAGIC_LEN: usize = 16;

/// Offset of the magic relative to the start of a slot of `slot_size` bytes
pub const fn magic_offset(slot_size: u32) -> u32 {
    slot_size - BOOT_MAGIC_LEN as u32
}
