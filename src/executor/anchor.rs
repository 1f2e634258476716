//! Enumeration anchor
//!
//! Fixed 128-byte cursor. The first two bytes are a little-endian tag;
//! the rest is owned by the record source and passed through untouched.
//! An all-zero anchor starts a scan from the beginning.

use std::fmt;

pub const ANCHOR_SIZE: usize = 128;
/// Bytes available to the record source
pub const ANCHOR_BODY_SIZE: usize = ANCHOR_SIZE - 2;

const TAG_INITIAL: u16 = 0;
const TAG_POSITIONED: u16 = 1;
const TAG_EOF: u16 = 2;

/// Where an anchor points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    Initial,
    Positioned,
    Eof,
    /// Tag this engine does not produce; treated as a position
    Unknown(u16),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    bytes: [u8; ANCHOR_SIZE],
}

impl Anchor {
    /// Anchor at the start of the object
    pub fn new() -> Self {
        Self {
            bytes: [0; ANCHOR_SIZE],
        }
    }

    /// Anchor past the last record
    pub fn eof() -> Self {
        let mut anchor = Self::new();
        anchor.set_tag(TAG_EOF);
        anchor
    }

    /// Positioned anchor carrying a source-defined body.
    ///
    /// Bodies longer than `ANCHOR_BODY_SIZE` are truncated.
    pub fn at(body: &[u8]) -> Self {
        let mut anchor = Self::new();
        anchor.set_tag(TAG_POSITIONED);
        let len = body.len().min(ANCHOR_BODY_SIZE);
        anchor.bytes[2..2 + len].copy_from_slice(&body[..len]);
        anchor
    }

    pub fn from_bytes(bytes: [u8; ANCHOR_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; ANCHOR_SIZE] {
        &self.bytes
    }

    pub fn state(&self) -> AnchorState {
        match self.tag() {
            TAG_INITIAL => AnchorState::Initial,
            TAG_POSITIONED => AnchorState::Positioned,
            TAG_EOF => AnchorState::Eof,
            other => AnchorState::Unknown(other),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.tag() == TAG_INITIAL
    }

    pub fn is_eof(&self) -> bool {
        self.tag() == TAG_EOF
    }

    /// Source-owned bytes after the tag
    pub fn body(&self) -> &[u8] {
        &self.bytes[2..]
    }

    fn tag(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    fn set_tag(&mut self, tag: u16) {
        self.bytes[..2].copy_from_slice(&tag.to_le_bytes());
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self
            .body()
            .iter()
            .rposition(|b| *b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        f.debug_struct("Anchor")
            .field("state", &self.state())
            .field("body", &&self.body()[..used])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_anchor_is_initial() {
        let anchor = Anchor::from_bytes([0; ANCHOR_SIZE]);
        assert!(anchor.is_initial());
        assert_eq!(anchor, Anchor::new());
    }

    #[test]
    fn test_positioned_body() {
        let anchor = Anchor::at(&7u64.to_le_bytes());
        assert_eq!(anchor.state(), AnchorState::Positioned);
        assert!(!anchor.is_initial());
        assert_eq!(&anchor.body()[..8], &7u64.to_le_bytes());
        assert!(anchor.body()[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_eof() {
        let anchor = Anchor::eof();
        assert!(anchor.is_eof());
        assert_eq!(&anchor.as_bytes()[..2], &[2, 0]);
    }

    #[test]
    fn test_long_body_truncated() {
        let anchor = Anchor::at(&[0xab; 200]);
        assert_eq!(anchor.body().len(), ANCHOR_BODY_SIZE);
        assert!(anchor.body().iter().all(|b| *b == 0xab));
    }

    #[test]
    fn test_unknown_tag() {
        let mut bytes = [0; ANCHOR_SIZE];
        bytes[0] = 9;
        assert_eq!(Anchor::from_bytes(bytes).state(), AnchorState::Unknown(9));
    }
}
