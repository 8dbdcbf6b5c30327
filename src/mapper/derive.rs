use sha1::{Digest, Sha1};

/// Number of decimal digits in a conference ID.
pub const ID_DIGITS: u32 = 6;
/// Exclusive upper bound of the ID space.
pub const ID_SPACE: u64 = 10u64.pow(ID_DIGITS);

pub fn normalize_conference(name: &str) -> String {
    name.to_lowercase()
}

/// Maps a normalized conference name onto `[0, ID_SPACE)`.
///
/// The whole SHA-1 digest is read as one big-endian integer and reduced
/// modulo `ID_SPACE`, folding byte by byte so the 160-bit value never has
/// to be materialized. IDs handed out by earlier deployments depend on
/// this exact reduction.
pub fn derive_conference_id(normalized: &str) -> u32 {
    let digest = Sha1::digest(normalized.as_bytes());
    let id = digest
        .iter()
        .fold(0u64, |acc, byte| (acc * 256 + u64::from(*byte)) % ID_SPACE);
    id as u32
}
