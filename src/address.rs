//! Conversion between linear buffer offsets and the SNES mapped addresses
//! stored inside the text data.
//!
//! A mapped address is `offset + BANK_BASE`, written as four bytes in
//! little-endian order. The all-zero value is the null pointer.

/// HiROM bank base for the de-headered image.
pub const BANK_BASE: u32 = 0xC0_0000;

/// Width in bytes of a mapped address operand.
pub const MAPPED_LEN: usize = 4;

/// Convert a buffer offset to its mapped byte form.
///
/// Offset 0 is the null pointer and maps to all zeros.
pub fn to_mapped(offset: usize) -> [u8; MAPPED_LEN] {
    if offset == 0 {
        return [0; MAPPED_LEN];
    }
    (offset as u32).wrapping_add(BANK_BASE).to_le_bytes()
}

/// Convert mapped bytes back to a buffer offset.
///
/// Only the first four bytes are read; shorter input is zero-extended.
/// The all-zero value returns 0 (null).
pub fn from_mapped(bytes: &[u8]) -> usize {
    let mut raw = [0u8; MAPPED_LEN];
    for (dst, src) in raw.iter_mut().zip(bytes) {
        *dst = *src;
    }
    let value = u32::from_le_bytes(raw);
    if value == 0 {
        return 0;
    }
    value.wrapping_sub(BANK_BASE) as usize
}

/// True if the mapped bytes encode the null pointer.
pub fn is_null(bytes: &[u8]) -> bool {
    bytes.iter().take(MAPPED_LEN).all(|&b| b == 0)
}

/// Absolute SNES address for an offset, as printed in labels.
pub fn snes_address(offset: usize) -> u32 {
    (offset as u32).wrapping_add(BANK_BASE)
}

/// CCScript label for the block starting at `offset`.
pub fn label(offset: usize) -> String {
    format!("l_{:#x}", snes_address(offset))
}

/// Parse a hexadecimal SNES address such as `c50000`, `$c50000` or
/// `0xc50000` into a buffer offset. Values below the bank base are
/// rejected.
pub fn parse_snes_hex(text: &str) -> Option<usize> {
    let digits = text
        .trim()
        .trim_start_matches('$')
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    let value = u32::from_str_radix(digits, 16).ok()?;
    value.checked_sub(BANK_BASE).map(|offset| offset as usize)
}
