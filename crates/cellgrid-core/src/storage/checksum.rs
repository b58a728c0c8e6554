//! 32-bit FNV-1a.

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash `bytes` with 32-bit FNV-1a.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(OFFSET_BASIS, |state, &byte| {
        (state ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
