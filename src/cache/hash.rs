// Content fingerprinting.
// Fast non-cryptographic hash used to notice drift between cached and fetched content.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a (32-bit) over the UTF-8 bytes of `content`, as 8 lowercase hex digits.
///
/// Good enough to detect accidental change; not collision resistant against
/// an adversary.
pub fn fingerprint(content: &str) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in content.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{:08x}", hash)
}
