// Content-hash primitive shared by the block model. 32-byte BLAKE2b digest,
// hex-encoded, matching the hash construction used elsewhere for content
// addressing.

use blake2b_simd::Params;

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let digest = Params::new().hash_length(32).to_state().update(data).finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    out
}

/// Hex-encoded content address of `raw`, used as a block's `hash`.
pub fn block_hash_hex(raw: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(&blake2b_256(raw))
}
