//! Fixed binary point layouts, one per schema
//!
//! All records are `#[repr(C)]` plain old data with explicit zeroed padding,
//! so the in-memory layout is also the on-disk layout. Multi-byte fields use
//! native endianness; stores are not portable across byte orders.

use crate::core::error::Error;
use crate::core::types::{DVec3, Result, Vec3};
use crate::math::Aabb;
use crate::point::accessor::{PointAccessor, PointRecord};
use crate::point::schema::PointSchema;
use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

/// Position only
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64 {
    pub position: DVec3,
}

/// Position, color and intensity
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Col32IShort {
    pub position: DVec3,
    pub color: Vec3,
    pub intensity: u16,
    _pad: [u8; 2],
}

/// Position and intensity
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64IShort {
    pub position: DVec3,
    pub intensity: u16,
    _pad: [u8; 6],
}

/// Position and color
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Col32 {
    pub position: DVec3,
    pub color: Vec3,
    _pad: [u8; 4],
}

/// Position and classification label
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Label8 {
    pub position: DVec3,
    pub label: u8,
    _pad: [u8; 7],
}

/// Position, normal, color and intensity
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Nor32Col32IShort {
    pub position: DVec3,
    pub normal: Vec3,
    pub color: Vec3,
    pub intensity: u16,
    _pad: [u8; 6],
}

/// Position, normal and intensity
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Nor32IShort {
    pub position: DVec3,
    pub normal: Vec3,
    pub intensity: u16,
    _pad: [u8; 2],
}

/// Position, normal and color
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Pos64Nor32Col32 {
    pub position: DVec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Pos64 {
    pub fn new(position: DVec3) -> Self {
        Self { position }
    }
}

impl Pos64Col32IShort {
    pub fn new(position: DVec3, color: Vec3, intensity: u16) -> Self {
        Self {
            position,
            color,
            intensity,
            _pad: [0; 2],
        }
    }
}

impl Pos64IShort {
    pub fn new(position: DVec3, intensity: u16) -> Self {
        Self {
            position,
            intensity,
            _pad: [0; 6],
        }
    }
}

impl Pos64Col32 {
    pub fn new(position: DVec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            _pad: [0; 4],
        }
    }
}

impl Pos64Label8 {
    pub fn new(position: DVec3, label: u8) -> Self {
        Self {
            position,
            label,
            _pad: [0; 7],
        }
    }
}

impl Pos64Nor32Col32IShort {
    pub fn new(position: DVec3, normal: Vec3, color: Vec3, intensity: u16) -> Self {
        Self {
            position,
            normal,
            color,
            intensity,
            _pad: [0; 6],
        }
    }
}

impl Pos64Nor32IShort {
    pub fn new(position: DVec3, normal: Vec3, intensity: u16) -> Self {
        Self {
            position,
            normal,
            intensity,
            _pad: [0; 2],
        }
    }
}

impl Pos64Nor32Col32 {
    pub fn new(position: DVec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }
}

macro_rules! point_accessor {
    ($accessor:ident => $record:ident { $($field:ident),* }) => {
        #[doc = concat!("Field accessor for [`", stringify!($record), "`]")]
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $accessor;

        impl PointAccessor for $accessor {
            type Point = $record;

            #[inline]
            fn schema(&self) -> PointSchema {
                PointSchema::$record
            }

            #[inline]
            fn position64(&self, point: &$record) -> DVec3 {
                point.position
            }

            #[inline]
            fn set_position64(&self, point: &mut $record, value: DVec3) {
                point.position = value;
            }

            $( point_accessor!(@field $field $record); )*
        }

        impl PointRecord for $record {
            const SCHEMA: PointSchema = PointSchema::$record;
            type Accessor = $accessor;
        }
    };
    (@field color $record:ident) => {
        #[inline]
        fn color32(&self, point: &$record) -> Vec3 {
            point.color
        }

        #[inline]
        fn set_color32(&self, point: &mut $record, value: Vec3) {
            point.color = value;
        }
    };
    (@field normal $record:ident) => {
        #[inline]
        fn normal32(&self, point: &$record) -> Vec3 {
            point.normal
        }

        #[inline]
        fn set_normal32(&self, point: &mut $record, value: Vec3) {
            point.normal = value;
        }
    };
    (@field intensity $record:ident) => {
        #[inline]
        fn intensity16(&self, point: &$record) -> u16 {
            point.intensity
        }

        #[inline]
        fn set_intensity16(&self, point: &mut $record, value: u16) {
            point.intensity = value;
        }
    };
    (@field label $record:ident) => {
        #[inline]
        fn label8(&self, point: &$record) -> u8 {
            point.label
        }

        #[inline]
        fn set_label8(&self, point: &mut $record, value: u8) {
            point.label = value;
        }
    };
}

point_accessor!(Pos64Accessor => Pos64 {});
point_accessor!(Pos64Col32IShortAccessor => Pos64Col32IShort { color, intensity });
point_accessor!(Pos64IShortAccessor => Pos64IShort { intensity });
point_accessor!(Pos64Col32Accessor => Pos64Col32 { color });
point_accessor!(Pos64Label8Accessor => Pos64Label8 { label });
point_accessor!(Pos64Nor32Col32IShortAccessor => Pos64Nor32Col32IShort { normal, color, intensity });
point_accessor!(Pos64Nor32IShortAccessor => Pos64Nor32IShort { normal, intensity });
point_accessor!(Pos64Nor32Col32Accessor => Pos64Nor32Col32 { normal, color });

/// View records as their raw byte layout
pub fn encode_records<P: PointRecord>(points: &[P]) -> &[u8] {
    bytemuck::cast_slice(points)
}

/// Copy records out of a byte buffer of any alignment
pub fn decode_records<P: PointRecord>(bytes: &[u8]) -> Result<Vec<P>> {
    let size = std::mem::size_of::<P>();
    if bytes.len() % size != 0 {
        return Err(Error::InvalidInput(format!(
            "{} bytes is not a whole number of {} records ({} bytes each)",
            bytes.len(),
            P::SCHEMA,
            size
        )));
    }
    let mut points = vec![P::zeroed(); bytes.len() / size];
    bytemuck::cast_slice_mut::<P, u8>(&mut points).copy_from_slice(bytes);
    Ok(points)
}

/// Bounding box of every record position, `None` when empty
pub fn bounds_of<P: PointRecord>(points: &[P]) -> Option<Aabb> {
    if points.is_empty() {
        return None;
    }
    let acc = P::accessor();
    let aabb = points
        .par_iter()
        .fold(
            || Aabb::EMPTY,
            |mut aabb, p| {
                aabb.expand(acc.position64(p));
                aabb
            },
        )
        .reduce(|| Aabb::EMPTY, |a, b| a.merged(&b));
    Some(aabb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<P: PointRecord>(i: usize) -> P {
        let acc = P::accessor();
        let mut p = P::default();
        let f = i as f64;
        acc.set_position64(&mut p, DVec3::new(f * 0.1 + 1.0e5, -f, f * f));
        if acc.has_color32() {
            acc.set_color32(&mut p, Vec3::new(i as f32, 65535.0, 0.5));
        }
        if acc.has_normal32() {
            acc.set_normal32(&mut p, Vec3::new(0.0, 1.0, 0.0));
        }
        if acc.has_intensity16() {
            acc.set_intensity16(&mut p, (i * 37) as u16);
        }
        if acc.has_label8() {
            acc.set_label8(&mut p, (i % 32) as u8);
        }
        p
    }

    fn check_bytes<P: PointRecord>() {
        let points: Vec<P> = (0..50).map(sample::<P>).collect();
        let bytes = encode_records(&points);
        assert_eq!(bytes.len(), points.len() * P::SCHEMA.record_size());

        // Decode from a misaligned slice
        let mut shifted = vec![0u8; 1];
        shifted.extend_from_slice(bytes);
        let decoded: Vec<P> = decode_records(&shifted[1..]).unwrap();
        assert_eq!(decoded, points);
    }

    #[test]
    fn test_bytes_every_schema() {
        for schema in PointSchema::ALL {
            crate::dispatch_schema!(schema, P => check_bytes::<P>());
        }
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let bytes = vec![0u8; 25];
        let err = decode_records::<Pos64>(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_decode_copies_out_of_buffer() {
        assert!(decode_records::<Pos64>(&[]).unwrap().is_empty());

        let mut raw = vec![0xAAu8; 3];
        raw.extend_from_slice(encode_records(&[Pos64::new(DVec3::new(1.0, 2.0, 3.0))]));
        let decoded = decode_records::<Pos64>(&raw[3..]).unwrap();
        raw.fill(0);
        assert_eq!(decoded, vec![Pos64::new(DVec3::new(1.0, 2.0, 3.0))]);
    }

    #[test]
    fn test_padding_is_zeroed() {
        let p = Pos64Label8::new(DVec3::ONE, 9);
        let bytes = bytemuck::bytes_of(&p);
        assert_eq!(bytes[24], 9);
        assert!(bytes[25..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bounds_of() {
        assert!(bounds_of::<Pos64>(&[]).is_none());

        let points: Vec<Pos64> = (0..1000)
            .map(|i| Pos64::new(DVec3::new(i as f64, -(i as f64), 2.0)))
            .collect();
        let aabb = bounds_of(&points).unwrap();
        assert_eq!(aabb.min, DVec3::new(0.0, -999.0, 2.0));
        assert_eq!(aabb.max, DVec3::new(999.0, 0.0, 2.0));
    }
}
