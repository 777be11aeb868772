//! Vertex layouts synthesized from a 32-bit vertex flag word
//!
//! Vertex data is stored in a plain `U8__` section; the model's vertex
//! flags decide how those bytes split into per-vertex records. Bits are
//! applied in table order, so field order is fixed regardless of which bits
//! are set.
//!
//! | bit          | fields                              | bytes |
//! |--------------|-------------------------------------|-------|
//! | `0x00000001` | `position: VEC3`                    | 12 |
//! | `0x00000004` | `boneWeight0..3: uint8`             | 4 |
//! | `0x00000008` | `boneLookupIndex0..3: uint8`        | 4 |
//! | `0x00000020` | `normal: Vector4As4Fixed8`          | 4 |
//! | `0x00000200` | `color: COL`                        | 4 |
//! | `0x00020000` | `uv0: Vector2As2int16`              | 4 |
//! | `0x00040000` | `uv1: Vector2As2int16`              | 4 |
//! | `0x00080000` | `uv2: Vector2As2int16`              | 4 |
//! | `0x00100000` | `uv3: Vector2As2int16`              | 4 |
//! | `0x00200000` | `uv4: Vector2As2int16`              | 4 |
//! | `0x01000000` | `tangent: Vector4As4Fixed8`         | 4 |
//!
//! Bits outside the table add no fields.

use super::history::{FieldSpec, FieldSpecKind};

/// Name prefix of synthesized vertex structures (`VertexFormat0x182007d`)
pub const VERTEX_FORMAT_PREFIX: &str = "VertexFormat";

pub const VERTEX_POSITION: u32 = 0x0000_0001;
pub const VERTEX_BONE_WEIGHTS: u32 = 0x0000_0004;
pub const VERTEX_BONE_LOOKUP: u32 = 0x0000_0008;
pub const VERTEX_NORMAL: u32 = 0x0000_0020;
pub const VERTEX_COLOR: u32 = 0x0000_0200;
pub const VERTEX_UV0: u32 = 0x0002_0000;
pub const VERTEX_UV1: u32 = 0x0004_0000;
pub const VERTEX_UV2: u32 = 0x0008_0000;
pub const VERTEX_UV3: u32 = 0x0010_0000;
pub const VERTEX_UV4: u32 = 0x0020_0000;
pub const VERTEX_TANGENT: u32 = 0x0100_0000;

const UINT8: &str = "uint8";

const VERTEX_LAYOUT: &[(u32, &[(&str, &str)])] = &[
    (VERTEX_POSITION, &[("position", "VEC3")]),
    (
        VERTEX_BONE_WEIGHTS,
        &[
            ("boneWeight0", UINT8),
            ("boneWeight1", UINT8),
            ("boneWeight2", UINT8),
            ("boneWeight3", UINT8),
        ],
    ),
    (
        VERTEX_BONE_LOOKUP,
        &[
            ("boneLookupIndex0", UINT8),
            ("boneLookupIndex1", UINT8),
            ("boneLookupIndex2", UINT8),
            ("boneLookupIndex3", UINT8),
        ],
    ),
    (VERTEX_NORMAL, &[("normal", "Vector4As4Fixed8")]),
    (VERTEX_COLOR, &[("color", "COL")]),
    (VERTEX_UV0, &[("uv0", "Vector2As2int16")]),
    (VERTEX_UV1, &[("uv1", "Vector2As2int16")]),
    (VERTEX_UV2, &[("uv2", "Vector2As2int16")]),
    (VERTEX_UV3, &[("uv3", "Vector2As2int16")]),
    (VERTEX_UV4, &[("uv4", "Vector2As2int16")]),
    (VERTEX_TANGENT, &[("tangent", "Vector4As4Fixed8")]),
];

/// Structure name of the vertex layout for `flags`
pub fn vertex_format_name(flags: u32) -> String {
    format!("{VERTEX_FORMAT_PREFIX}{flags:#x}")
}

/// Inverse of [`vertex_format_name`]
pub fn parse_vertex_format_name(name: &str) -> Option<u32> {
    let hex = name
        .strip_prefix(VERTEX_FORMAT_PREFIX)?
        .strip_prefix("0x")?;
    u32::from_str_radix(hex, 16).ok()
}

/// Field descriptors for the layout selected by `flags`
pub(crate) fn vertex_field_specs(flags: u32) -> Vec<FieldSpec> {
    VERTEX_LAYOUT
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .flat_map(|(_, fields)| fields.iter())
        .map(|(name, ty)| FieldSpec {
            name: (*name).to_string(),
            kind: if *ty == UINT8 {
                FieldSpecKind::Int {
                    signed: false,
                    bits: 8,
                    default: None,
                    expected: None,
                    masks: Vec::new(),
                }
            } else {
                FieldSpecKind::Structure {
                    type_name: (*ty).to_string(),
                    ref_to: None,
                }
            },
            since: None,
            till: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_format_name() {
        assert_eq!(vertex_format_name(0x182007d), "VertexFormat0x182007d");
        assert_eq!(parse_vertex_format_name("VertexFormat0x182007d"), Some(0x182007d));
        assert_eq!(parse_vertex_format_name("VertexFormat182007d"), None);
        assert_eq!(parse_vertex_format_name("VEC3"), None);
    }

    #[test]
    fn test_field_order_is_table_order() {
        let names: Vec<String> = vertex_field_specs(VERTEX_TANGENT | VERTEX_COLOR | VERTEX_POSITION)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["position", "color", "tangent"]);
    }

    #[test]
    fn test_uv_channels() {
        let specs = vertex_field_specs(VERTEX_UV0 | VERTEX_UV2 | VERTEX_UV4);
        let names: Vec<&str> = specs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["uv0", "uv2", "uv4"]);
    }

    #[test]
    fn test_unlisted_bits_add_nothing() {
        assert!(vertex_field_specs(0x10 | 0x40 | 0x80_0000).is_empty());
    }
}
