//! # Cluster Key Slots
//!
//! Purpose: Map a key onto one of the 16384 cluster hash slots exactly the
//! way the server does, so the client can pick the owning primary itself.
//!
//! ## Design Principles
//! 1. **Table-Driven CRC**: CRC16/XMODEM through a table built at compile time.
//! 2. **Hash Tags**: Only the first non-empty `{...}` section is hashed, so
//!    related keys can be forced into the same slot.
//! 3. **Binary-Safe**: Keys are raw bytes; no UTF-8 assumptions.

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

const CRC16_TABLE: [u16; 256] = build_crc16_table();

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut idx = 0;
    while idx < 256 {
        let mut crc = (idx as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[idx] = crc;
        idx += 1;
    }
    table
}

/// CRC16/XMODEM checksum (polynomial 0x1021, zero initial value).
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ byte) as usize]
    })
}

/// Returns the hash slot owning `key`.
pub fn key_slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key)) % SLOT_COUNT
}

/// Returns the part of `key` that participates in slot hashing.
fn hash_tag(key: &[u8]) -> &[u8] {
    let open = match key.iter().position(|&b| b == b'{') {
        Some(pos) => pos,
        None => return key,
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        // `{}` is not a tag; the whole key is hashed.
        Some(0) | None => key,
        Some(len) => &key[open + 1..open + 1 + len],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn known_key_slots() {
        assert_eq!(key_slot(b"foo"), 12182);
        assert_eq!(key_slot(b"123456789"), 0x31C3);
    }

    #[test]
    fn hash_tags_share_slot() {
        assert_eq!(
            key_slot(b"{user1000}.following"),
            key_slot(b"{user1000}.followers")
        );
        assert_eq!(key_slot(b"{user1000}.following"), key_slot(b"user1000"));
    }

    #[test]
    fn empty_or_unterminated_tag_hashes_whole_key() {
        assert_eq!(key_slot(b"foo{}{bar}"), crc16(b"foo{}{bar}") % SLOT_COUNT);
        assert_eq!(key_slot(b"foo{bar"), crc16(b"foo{bar") % SLOT_COUNT);
        assert_eq!(key_slot(b"foo{{bar}}zap"), crc16(b"{bar") % SLOT_COUNT);
    }

    #[test]
    fn slots_stay_in_range() {
        for idx in 0..1000u32 {
            let key = format!("key:{idx}");
            assert!(key_slot(key.as_bytes()) < SLOT_COUNT);
        }
    }
}
