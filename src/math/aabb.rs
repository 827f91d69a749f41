//! Double-precision axis-aligned bounding box

use crate::core::types::DVec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Box with inverted infinite extents; expanding it by a point yields that point
    pub const EMPTY: Aabb = Aabb {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    /// Create AABB from min and max corners
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: DVec3, half_extent: DVec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Smallest box containing every point, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut aabb = Self::EMPTY;
        let mut any = false;
        for p in points {
            aabb.expand(p);
            any = true;
        }
        any.then_some(aabb)
    }

    /// False for [`Aabb::EMPTY`] and any box with min > max on some axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Get center point
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extent(&self) -> DVec3 {
        self.size() * 0.5
    }

    /// Largest edge length
    pub fn max_extent(&self) -> f64 {
        self.size().max_element()
    }

    /// Zero extent on every axis ("no data" for a dataset box)
    pub fn is_degenerate(&self) -> bool {
        self.size() == DVec3::ZERO
    }

    /// Check if point is inside AABB (closed on both sides)
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two AABBs intersect
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Octant of `p` relative to the box center.
    ///
    /// Bit 0 = +x, bit 1 = +y, bit 2 = +z. A coordinate exactly on the split
    /// plane belongs to the lower half.
    pub fn octant_of(&self, p: DVec3) -> u8 {
        let c = self.center();
        let mut index = 0u8;
        if p.x > c.x {
            index |= 1;
        }
        if p.y > c.y {
            index |= 2;
        }
        if p.z > c.z {
            index |= 4;
        }
        index
    }

    /// Get child octant AABB for octree subdivision
    /// index: 0-7 representing xyz octant (bit 0=x, bit 1=y, bit 2=z)
    ///
    /// Children share the parent's center exactly, so the eight boxes tile
    /// the parent without gaps.
    pub fn child_octant(&self, index: u8) -> Aabb {
        let center = self.center();
        let pick = |bit: u8, lo: f64, mid: f64, hi: f64| {
            if index & bit != 0 { (mid, hi) } else { (lo, mid) }
        };
        let (min_x, max_x) = pick(1, self.min.x, center.x, self.max.x);
        let (min_y, max_y) = pick(2, self.min.y, center.y, self.max.y);
        let (min_z, max_z) = pick(4, self.min.z, center.z, self.max.z);

        Aabb::new(DVec3::new(min_x, min_y, min_z), DVec3::new(max_x, max_y, max_z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert_eq!(aabb.center(), DVec3::splat(0.5));
        assert_eq!(aabb.size(), DVec3::ONE);
        assert_eq!(aabb.max_extent(), 1.0);
    }

    #[test]
    fn test_contains_point() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert!(aabb.contains_point(DVec3::splat(0.5)));
        assert!(aabb.contains_point(DVec3::ONE));
        assert!(!aabb.contains_point(DVec3::splat(2.0)));
    }

    #[test]
    fn test_intersects() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::splat(0.5), DVec3::splat(1.5));
        let c = Aabb::new(DVec3::splat(2.0), DVec3::splat(3.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());

        let aabb = Aabb::from_points([
            DVec3::new(1.0, -2.0, 3.0),
            DVec3::new(-1.0, 4.0, 0.5),
        ])
        .unwrap();
        assert_eq!(aabb.min, DVec3::new(-1.0, -2.0, 0.5));
        assert_eq!(aabb.max, DVec3::new(1.0, 4.0, 3.0));
        assert!(aabb.is_valid());
        assert!(!Aabb::EMPTY.is_valid());
    }

    #[test]
    fn test_child_octant() {
        let parent = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let child0 = parent.child_octant(0); // -x, -y, -z
        assert_eq!(child0.min, DVec3::ZERO);
        assert_eq!(child0.max, DVec3::ONE);

        let child5 = parent.child_octant(5); // +x, -y, +z
        assert_eq!(child5.min, DVec3::new(1.0, 0.0, 1.0));
        assert_eq!(child5.max, DVec3::new(2.0, 1.0, 2.0));
    }

    #[test]
    fn test_octant_of_split_plane_goes_low() {
        let parent = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        assert_eq!(parent.octant_of(DVec3::splat(1.0)), 0);
        assert_eq!(parent.octant_of(DVec3::new(1.5, 1.0, 0.2)), 1);
        assert_eq!(parent.octant_of(DVec3::new(0.2, 1.5, 1.5)), 6);

        for i in 0..8u8 {
            let child = parent.child_octant(i);
            assert_eq!(parent.octant_of(child.center()), i);
            assert!(child.contains_point(child.center()));
        }
    }
}
