//! Point schema ids and their capability flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which optional fields a record layout carries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub position64: bool,
    pub color32: bool,
    pub normal32: bool,
    pub intensity16: bool,
    pub label8: bool,
}

impl Capabilities {
    const fn pos() -> Self {
        Self {
            position64: true,
            color32: false,
            normal32: false,
            intensity16: false,
            label8: false,
        }
    }
}

/// Record layout identifier, stored once per dataset.
///
/// Every layout carries a double precision position. The remaining fields
/// are encoded in the name: `Col32` three float color channels, `Nor32`
/// a float normal, `IShort` a 16 bit intensity, `Label8` a byte label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointSchema {
    Pos64,
    Pos64Col32IShort,
    Pos64IShort,
    Pos64Col32,
    Pos64Label8,
    Pos64Nor32Col32IShort,
    Pos64Nor32IShort,
    Pos64Nor32Col32,
}

impl PointSchema {
    pub const ALL: [PointSchema; 8] = [
        PointSchema::Pos64,
        PointSchema::Pos64Col32IShort,
        PointSchema::Pos64IShort,
        PointSchema::Pos64Col32,
        PointSchema::Pos64Label8,
        PointSchema::Pos64Nor32Col32IShort,
        PointSchema::Pos64Nor32IShort,
        PointSchema::Pos64Nor32Col32,
    ];

    /// Fixed capability flags of this layout
    pub const fn capabilities(self) -> Capabilities {
        let base = Capabilities::pos();
        match self {
            PointSchema::Pos64 => base,
            PointSchema::Pos64Col32IShort => Capabilities {
                color32: true,
                intensity16: true,
                ..base
            },
            PointSchema::Pos64IShort => Capabilities {
                intensity16: true,
                ..base
            },
            PointSchema::Pos64Col32 => Capabilities {
                color32: true,
                ..base
            },
            PointSchema::Pos64Label8 => Capabilities {
                label8: true,
                ..base
            },
            PointSchema::Pos64Nor32Col32IShort => Capabilities {
                normal32: true,
                color32: true,
                intensity16: true,
                ..base
            },
            PointSchema::Pos64Nor32IShort => Capabilities {
                normal32: true,
                intensity16: true,
                ..base
            },
            PointSchema::Pos64Nor32Col32 => Capabilities {
                normal32: true,
                color32: true,
                ..base
            },
        }
    }

    /// Size in bytes of one encoded record
    pub const fn record_size(self) -> usize {
        match self {
            PointSchema::Pos64 => 24,
            PointSchema::Pos64Col32IShort => 40,
            PointSchema::Pos64IShort => 32,
            PointSchema::Pos64Col32 => 40,
            PointSchema::Pos64Label8 => 32,
            PointSchema::Pos64Nor32Col32IShort => 56,
            PointSchema::Pos64Nor32IShort => 40,
            PointSchema::Pos64Nor32Col32 => 48,
        }
    }

    /// Schema name as written in metadata
    pub fn name(self) -> &'static str {
        match self {
            PointSchema::Pos64 => "Pos64",
            PointSchema::Pos64Col32IShort => "Pos64Col32IShort",
            PointSchema::Pos64IShort => "Pos64IShort",
            PointSchema::Pos64Col32 => "Pos64Col32",
            PointSchema::Pos64Label8 => "Pos64Label8",
            PointSchema::Pos64Nor32Col32IShort => "Pos64Nor32Col32IShort",
            PointSchema::Pos64Nor32IShort => "Pos64Nor32IShort",
            PointSchema::Pos64Nor32Col32 => "Pos64Nor32Col32",
        }
    }
}

impl fmt::Display for PointSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_schema_has_position() {
        for schema in PointSchema::ALL {
            assert!(schema.capabilities().position64, "{schema}");
            assert!(schema.record_size() >= 24);
            assert_eq!(schema.record_size() % 8, 0);
        }
    }

    #[test]
    fn test_capabilities_follow_name() {
        for schema in PointSchema::ALL {
            let caps = schema.capabilities();
            let name = schema.name();
            assert_eq!(caps.color32, name.contains("Col32"), "{name}");
            assert_eq!(caps.normal32, name.contains("Nor32"), "{name}");
            assert_eq!(caps.intensity16, name.contains("IShort"), "{name}");
            assert_eq!(caps.label8, name.contains("Label8"), "{name}");
        }
    }

    #[test]
    fn test_serde_uses_variant_name() {
        let json = serde_json::to_string(&PointSchema::Pos64Nor32IShort).unwrap();
        assert_eq!(json, "\"Pos64Nor32IShort\"");
        let back: PointSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PointSchema::Pos64Nor32IShort);
    }
}
