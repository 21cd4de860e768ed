use std::cmp::Ordering;
use std::fmt;

/// Width of an index key in bytes.
pub const KEY_SIZE: usize = 8;

/// An opaque fixed-width key. The tree never interprets the bytes itself;
/// ordering comes entirely from the comparator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexKey([u8; KEY_SIZE]);

impl IndexKey {
    /// Builds a key from raw bytes, zero-padding short input.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= KEY_SIZE, "key too wide");
        let mut buf = [0u8; KEY_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self(buf)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.to_u64())
    }
}

/// Total order over index keys.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering;
}

/// Orders keys as little-endian unsigned integers.
#[derive(Clone, Copy, Default)]
pub struct UintComparator;

impl KeyComparator for UintComparator {
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        a.to_u64().cmp(&b.to_u64())
    }
}

/// Orders keys lexicographically by their raw bytes.
#[derive(Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_comparator() {
        let cmp = UintComparator;
        let a = IndexKey::from_u64(3);
        let b = IndexKey::from_u64(300);
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
        assert_eq!(cmp.compare(&b, &a), Ordering::Greater);
        assert_eq!(cmp.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_bytewise_comparator() {
        let cmp = BytewiseComparator;
        let a = IndexKey::from_bytes(b"apple");
        let b = IndexKey::from_bytes(b"banana");
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_key_round_trip() {
        let key = IndexKey::from_u64(0xDEAD_BEEF);
        assert_eq!(key.to_u64(), 0xDEAD_BEEF);
        assert_eq!(IndexKey::from_bytes(key.as_bytes()), key);
    }
}
