//! Packed result descriptor returned by the compile entry point.
//!
//! The entry point has a single `u32` return value, so it packs two fields:
//!
//! ```text
//! bits [31 : length_bits]   address  (offset into guest memory)
//! bits [length_bits-1 : 0]  length   (artifact byte count)
//! ```
//!
//! With the default 16-bit length field a single artifact is capped at
//! 65535 bytes. An address field with every bit set marks a compiler
//! failure; the length field then counts the bytes of a UTF-8 diagnostic
//! written at the heap base.

use crate::error::{BridgeError, BridgeResult};
use crate::memory::ByteRange;

/// Bit split between the address and length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayout {
    length_bits: u32,
}

/// A decoded descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    /// The compiled artifact lives at this range of guest memory.
    Artifact(ByteRange),
    /// The compiler failed; its diagnostic is `message_len` bytes long.
    Failure { message_len: u32 },
}

impl DescriptorLayout {
    pub const DEFAULT_LENGTH_BITS: u32 = 16;

    pub fn new(length_bits: u32) -> BridgeResult<Self> {
        if !(1..=31).contains(&length_bits) {
            return Err(BridgeError::Config(format!(
                "`length_bits` must be within 1..=31, got {length_bits}"
            )));
        }
        Ok(Self { length_bits })
    }

    pub fn length_bits(self) -> u32 {
        self.length_bits
    }

    fn length_mask(self) -> u32 {
        (1u32 << self.length_bits) - 1
    }

    /// Largest artifact the length field can describe.
    pub fn max_artifact_len(self) -> u32 {
        self.length_mask()
    }

    /// Address value reserved for compiler failures.
    pub fn failure_address(self) -> u32 {
        u32::MAX >> self.length_bits
    }

    /// Split a raw descriptor into its address and length fields.
    pub fn split(self, raw: u32) -> (u32, u32) {
        (raw >> self.length_bits, raw & self.length_mask())
    }

    pub fn decode(self, raw: u32) -> Descriptor {
        let (address, len) = self.split(raw);
        if address == self.failure_address() {
            Descriptor::Failure { message_len: len }
        } else {
            Descriptor::Artifact(ByteRange::new(address, len))
        }
    }

    /// Pack an address and length, or `None` if either does not fit.
    pub fn encode(self, address: u32, len: u32) -> Option<u32> {
        if len > self.length_mask() || address >= self.failure_address() {
            return None;
        }
        Some((address << self.length_bits) | len)
    }
}

impl Default for DescriptorLayout {
    fn default() -> Self {
        Self {
            length_bits: Self::DEFAULT_LENGTH_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_address_high_length_low() {
        let layout = DescriptorLayout::default();
        assert_eq!(
            layout.decode(0x0010_0020),
            Descriptor::Artifact(ByteRange::new(16, 32))
        );
    }

    #[test]
    fn address_shift_is_unsigned() {
        let layout = DescriptorLayout::default();
        assert_eq!(layout.split(0x8000_0001), (0x8000, 1));
    }

    #[test]
    fn zero_is_an_empty_artifact() {
        let layout = DescriptorLayout::default();
        assert_eq!(
            layout.decode(0),
            Descriptor::Artifact(ByteRange::new(0, 0))
        );
    }

    #[test]
    fn all_ones_address_is_failure() {
        let layout = DescriptorLayout::default();
        assert_eq!(
            layout.decode(0xFFFF_0007),
            Descriptor::Failure { message_len: 7 }
        );
    }

    #[test]
    fn default_caps_artifacts_at_65535_bytes() {
        let layout = DescriptorLayout::default();
        assert_eq!(layout.max_artifact_len(), 65535);
        assert_eq!(layout.encode(0, 65535), Some(0x0000_FFFF));
        assert_eq!(layout.encode(0, 65536), None);
    }

    #[test]
    fn wider_length_field_moves_the_split() {
        let layout = DescriptorLayout::new(20).unwrap();
        let raw = layout.encode(0x123, 0x4_5678).unwrap();
        assert_eq!(layout.split(raw), (0x123, 0x4_5678));
        assert_eq!(layout.max_artifact_len(), (1 << 20) - 1);
        assert_eq!(layout.failure_address(), 0xFFF);
    }

    #[test]
    fn encode_refuses_the_failure_address() {
        let layout = DescriptorLayout::default();
        assert_eq!(layout.encode(0xFFFF, 1), None);
    }

    #[test]
    fn rejects_degenerate_widths() {
        assert!(DescriptorLayout::new(0).is_err());
        assert!(DescriptorLayout::new(32).is_err());
        assert!(DescriptorLayout::new(31).is_ok());
    }
}
