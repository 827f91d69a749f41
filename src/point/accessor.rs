//! Capability-checked field access over opaque point records

use crate::core::types::{DVec3, Vec3};
use crate::point::schema::PointSchema;
use std::fmt::Debug;

/// A fixed-layout point record with a known schema.
///
/// Records are plain old data so node blobs can be cast to and from bytes
/// without a per-field codec.
pub trait PointRecord:
    bytemuck::Pod + Default + Debug + PartialEq + Send + Sync + 'static
{
    /// Schema id stored alongside datasets of this record type
    const SCHEMA: PointSchema;

    /// Accessor that reads and writes this record's fields
    type Accessor: PointAccessor<Point = Self>;

    /// Get the accessor for this record type
    fn accessor() -> Self::Accessor {
        Self::Accessor::default()
    }
}

#[cold]
#[track_caller]
fn unsupported(schema: PointSchema, field: &str) -> ! {
    panic!("point schema {schema} has no {field} field")
}

/// Typed get/set operations for one point schema.
///
/// Only `position64` is mandatory; every other field is optional and must be
/// guarded by the matching `has_*` query. Calling an accessor for a field the
/// schema lacks is a programming error and panics.
pub trait PointAccessor: Copy + Default + Debug + Send + Sync + 'static {
    type Point;

    /// Schema this accessor serves
    fn schema(&self) -> PointSchema;

    fn has_position64(&self) -> bool {
        self.schema().capabilities().position64
    }

    fn has_color32(&self) -> bool {
        self.schema().capabilities().color32
    }

    fn has_normal32(&self) -> bool {
        self.schema().capabilities().normal32
    }

    fn has_intensity16(&self) -> bool {
        self.schema().capabilities().intensity16
    }

    fn has_label8(&self) -> bool {
        self.schema().capabilities().label8
    }

    fn position64(&self, point: &Self::Point) -> DVec3;

    fn set_position64(&self, point: &mut Self::Point, value: DVec3);

    /// Color channels in the 16 bit range (0..=65535)
    fn color32(&self, _point: &Self::Point) -> Vec3 {
        unsupported(self.schema(), "color32")
    }

    fn set_color32(&self, _point: &mut Self::Point, _value: Vec3) {
        unsupported(self.schema(), "color32")
    }

    fn normal32(&self, _point: &Self::Point) -> Vec3 {
        unsupported(self.schema(), "normal32")
    }

    fn set_normal32(&self, _point: &mut Self::Point, _value: Vec3) {
        unsupported(self.schema(), "normal32")
    }

    fn intensity16(&self, _point: &Self::Point) -> u16 {
        unsupported(self.schema(), "intensity16")
    }

    fn set_intensity16(&self, _point: &mut Self::Point, _value: u16) {
        unsupported(self.schema(), "intensity16")
    }

    fn label8(&self, _point: &Self::Point) -> u8 {
        unsupported(self.schema(), "label8")
    }

    fn set_label8(&self, _point: &mut Self::Point, _value: u8) {
        unsupported(self.schema(), "label8")
    }
}

/// Run `$body` with `$P` bound to the record type of a runtime schema id.
///
/// ```
/// use pointstream::dispatch_schema;
/// use pointstream::point::PointSchema;
///
/// let schema = PointSchema::Pos64Label8;
/// let size = dispatch_schema!(schema, P => std::mem::size_of::<P>());
/// assert_eq!(size, schema.record_size());
/// ```
#[macro_export]
macro_rules! dispatch_schema {
    ($schema:expr, $P:ident => $body:expr) => {
        match $schema {
            $crate::point::PointSchema::Pos64 => {
                type $P = $crate::point::Pos64;
                $body
            }
            $crate::point::PointSchema::Pos64Col32IShort => {
                type $P = $crate::point::Pos64Col32IShort;
                $body
            }
            $crate::point::PointSchema::Pos64IShort => {
                type $P = $crate::point::Pos64IShort;
                $body
            }
            $crate::point::PointSchema::Pos64Col32 => {
                type $P = $crate::point::Pos64Col32;
                $body
            }
            $crate::point::PointSchema::Pos64Label8 => {
                type $P = $crate::point::Pos64Label8;
                $body
            }
            $crate::point::PointSchema::Pos64Nor32Col32IShort => {
                type $P = $crate::point::Pos64Nor32Col32IShort;
                $body
            }
            $crate::point::PointSchema::Pos64Nor32IShort => {
                type $P = $crate::point::Pos64Nor32IShort;
                $body
            }
            $crate::point::PointSchema::Pos64Nor32Col32 => {
                type $P = $crate::point::Pos64Nor32Col32;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::records::*;

    #[test]
    fn test_capabilities_match_schema() {
        let acc = Pos64Col32IShort::accessor();
        assert!(acc.has_position64());
        assert!(acc.has_color32());
        assert!(acc.has_intensity16());
        assert!(!acc.has_normal32());
        assert!(!acc.has_label8());
    }

    #[test]
    fn test_set_mutates_in_place() {
        let acc = Pos64Nor32Col32IShort::accessor();
        let mut p = Pos64Nor32Col32IShort::default();
        acc.set_position64(&mut p, DVec3::new(1.0e6, -2.5, 3.25));
        acc.set_normal32(&mut p, Vec3::Z);
        acc.set_color32(&mut p, Vec3::new(65535.0, 0.0, 256.0));
        acc.set_intensity16(&mut p, 4095);

        assert_eq!(acc.position64(&p), DVec3::new(1.0e6, -2.5, 3.25));
        assert_eq!(acc.normal32(&p), Vec3::Z);
        assert_eq!(acc.color32(&p), Vec3::new(65535.0, 0.0, 256.0));
        assert_eq!(acc.intensity16(&p), 4095);
    }

    #[test]
    fn test_label_accessor() {
        let acc = Pos64Label8::accessor();
        let mut p = Pos64Label8::default();
        acc.set_label8(&mut p, 17);
        assert_eq!(acc.label8(&p), 17);
        assert_eq!(acc.schema(), PointSchema::Pos64Label8);
    }

    #[test]
    #[should_panic(expected = "point schema Pos64 has no color32 field")]
    fn test_unsupported_field_panics() {
        let acc = Pos64::accessor();
        let p = Pos64::default();
        let _ = acc.color32(&p);
    }

    #[test]
    fn test_dispatch_schema_binds_record_type() {
        for schema in PointSchema::ALL {
            let (bound, size) = crate::dispatch_schema!(schema, P => (P::SCHEMA, std::mem::size_of::<P>()));
            assert_eq!(bound, schema);
            assert_eq!(size, schema.record_size());
        }
    }
}
