use serde::Serialize;
use std::fmt;

/// How a field's value is laid out after its tag. Only the contract lives
/// here; encoding and decoding payloads is left to the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WireType {
    Varint          = 0,
    Fixed64         = 1,
    LengthDelimited = 2,
    Fixed32         = 5,
}

impl WireType {
    pub fn from_bits(bits: u32) -> Option<WireType> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireType::Varint          => "varint",
            WireType::Fixed64         => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32         => "fixed32",
        })
    }
}

/// Combines a field number and wire type into a tag.
pub fn make_tag(number: i32, wire_type: WireType) -> u32 {
    ((number as u32) << 3) | wire_type as u32
}

/// Splits a tag back into field number and wire type.
pub fn split_tag(tag: u32) -> Option<(i32, WireType)> {
    WireType::from_bits(tag & 7).map(|w| ((tag >> 3) as i32, w))
}
