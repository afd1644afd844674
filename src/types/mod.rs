use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// 128-bit asset identifier. Canonical text form is 32 lowercase hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId([u8; 16]);

/// Index-local document handle, assigned densely starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(NonZeroU32);

impl AssetId {
    /// Parse the canonical 32-hex-char form. Case-insensitive on input.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_val(chunk[0]);
            let lo = hex_val(chunk[1]);
            bytes[i] = (hi << 4) | lo;
        }
        Some(Self(bytes))
    }

    /// Parse the dashed UUID form `8-4-4-4-12`.
    pub fn from_dashed(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() != 36 || b[8] != b'-' || b[13] != b'-' || b[18] != b'-' || b[23] != b'-' {
            return None;
        }
        let mut hex = String::with_capacity(32);
        for (i, c) in s.chars().enumerate() {
            if i == 8 || i == 13 || i == 18 || i == 23 {
                continue;
            }
            hex.push(c);
        }
        Self::from_hex(&hex)
    }

    /// Build an id from four 32-bit hash fields. Each field renders as eight
    /// nibbles, low nibble first within the field. The all-zero hash has no
    /// id and yields `None`.
    pub fn from_hash128(x: u32, y: u32, z: u32, w: u32) -> Option<Self> {
        if x == 0 && y == 0 && z == 0 && w == 0 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, v) in [x, y, z, w].into_iter().enumerate() {
            for m in 0..4 {
                let hi = ((v >> (8 * m)) & 0xF) as u8;
                let lo = ((v >> (8 * m + 4)) & 0xF) as u8;
                bytes[i * 4 + m] = (hi << 4) | lo;
            }
        }
        Some(Self(bytes))
    }

    /// Try both textual forms, canonical hex first.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_hex(s).or_else(|| Self::from_dashed(s))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(32);
        for b in &self.0 {
            out.push(hex_char(b >> 4));
            out.push(hex_char(b & 0xF));
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl DocId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }

    /// Zero-based position in the index's document table.
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

fn hex_char(v: u8) -> char {
    char::from_digit(v as u32, 16).unwrap_or('0')
}
