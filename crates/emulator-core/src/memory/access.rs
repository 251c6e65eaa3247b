//! Big-endian word access over the RAM byte store.

/// Width in bytes of an integer access.
pub const WORD_ACCESS_BYTES: u8 = 4;

/// Reads a big-endian 32-bit word starting at `at`.
///
/// Returns `None` when any of the four bytes lies outside `bytes`.
#[must_use]
pub fn read_u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    let end = at.checked_add(usize::from(WORD_ACCESS_BYTES))?;
    let word: [u8; 4] = bytes.get(at..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(word))
}

/// Writes `value` as a big-endian 32-bit word starting at `at`.
///
/// Returns `None`, leaving `bytes` untouched, when the word does not fit.
pub fn write_u32_be(bytes: &mut [u8], at: usize, value: u32) -> Option<()> {
    let end = at.checked_add(usize::from(WORD_ACCESS_BYTES))?;
    bytes.get_mut(at..end)?.copy_from_slice(&value.to_be_bytes());
    Some(())
}
