use core::ops::{Add, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};




/**
 * A 3D vector, used for points and directions alike.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}




// ============================================================================
impl Vec3 {

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn unit(axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(1.0, 0.0, 0.0),
            Axis::J => Self::new(0.0, 1.0, 0.0),
            Axis::K => Self::new(0.0, 0.0, 1.0),
        }
    }

    pub fn dot(&self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    /**
     * Return this vector scaled to unit length. A zero vector is returned
     * unchanged.
     */
    pub fn normalised(&self) -> Self {
        let n = self.norm();
        if n > 0.0 {
            *self * (1.0 / n)
        } else {
            *self
        }
    }

    pub fn min(&self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(&self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, a: f64) -> Self {
        Self::new(self.x * a, self.y * a, self.z * a)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}




/**
 * Identifier for a Cartesian axis of a block
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    I,
    J,
    K,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::I, Axis::J, Axis::K];

    pub fn index(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
            Axis::K => 2,
        }
    }
}




/**
 * One of the six faces of a block
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    IMin,
    IMax,
    JMin,
    JMax,
    KMin,
    KMax,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::IMin, Face::IMax, Face::JMin, Face::JMax, Face::KMin, Face::KMax];

    pub fn axis(self) -> Axis {
        match self {
            Face::IMin | Face::IMax => Axis::I,
            Face::JMin | Face::JMax => Axis::J,
            Face::KMin | Face::KMax => Axis::K,
        }
    }

    pub fn is_lower(self) -> bool {
        matches!(self, Face::IMin | Face::JMin | Face::KMin)
    }

    pub fn index(self) -> usize {
        match self {
            Face::IMin => 0,
            Face::IMax => 1,
            Face::JMin => 2,
            Face::JMax => 3,
            Face::KMin => 4,
            Face::KMax => 5,
        }
    }
}




/**
 * A rigid transformation from the inertial frame into a local frame:
 * `local = R * inertial + t`. The rotation matrix is assumed orthonormal, so
 * its inverse is its transpose.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordTransform {
    rotation: [[f64; 3]; 3],
    shift: Vec3,
}




// ============================================================================
impl CoordTransform {

    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            shift: Vec3::default(),
        }
    }

    /**
     * A pure translation putting the point `origin` at the local origin.
     */
    pub fn from_origin(origin: Vec3) -> Self {
        Self {
            shift: -origin,
            ..Self::identity()
        }
    }

    /**
     * Build the transform into a frame whose origin sits at `origin` and
     * whose first two axes point along `base_i` and `base_j`. The base
     * vectors are orthonormalized (Gram-Schmidt), and the third axis
     * completes a right-handed system.
     */
    pub fn from_base_ij(origin: Vec3, base_i: Vec3, base_j: Vec3) -> Self {
        let ei = base_i.normalised();
        let ej = (base_j - ei * ei.dot(base_j)).normalised();
        let ek = Vec3::new(
            ei.y * ej.z - ei.z * ej.y,
            ei.z * ej.x - ei.x * ej.z,
            ei.x * ej.y - ei.y * ej.x,
        );
        let rotation = [ei.as_array(), ej.as_array(), ek.as_array()];
        let mut transform = Self { rotation, shift: Vec3::default() };
        transform.shift = -transform.transfree(origin);
        transform
    }

    /**
     * Map a point from the inertial frame into the local frame.
     */
    pub fn transform(&self, p: Vec3) -> Vec3 {
        self.transfree(p) + self.shift
    }

    /**
     * Map a point from the local frame back into the inertial frame.
     */
    pub fn transform_reverse(&self, p: Vec3) -> Vec3 {
        let q = p - self.shift;
        let r = &self.rotation;
        Vec3::new(
            r[0][0] * q.x + r[1][0] * q.y + r[2][0] * q.z,
            r[0][1] * q.x + r[1][1] * q.y + r[2][1] * q.z,
            r[0][2] * q.x + r[1][2] * q.y + r[2][2] * q.z,
        )
    }

    /**
     * Rotate a direction vector (no translation).
     */
    pub fn transfree(&self, v: Vec3) -> Vec3 {
        let r = &self.rotation;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }

    pub fn inverse(&self) -> Self {
        let r = &self.rotation;
        let rotation = [
            [r[0][0], r[1][0], r[2][0]],
            [r[0][1], r[1][1], r[2][1]],
            [r[0][2], r[1][2], r[2][2]],
        ];
        let mut inverse = Self { rotation, shift: Vec3::default() };
        inverse.shift = -inverse.transfree(self.shift);
        inverse
    }

    /**
     * Return the transform of the same frame after the inertial space is
     * stretched by `factor` about its origin. Rotations are unchanged.
     */
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rotation: self.rotation,
            shift: self.shift * factor,
        }
    }

    /**
     * Return the transform applying `self` first and `other` second.
     */
    pub fn then(&self, other: &Self) -> Self {
        let a = &self.rotation;
        let b = &other.rotation;
        let mut rotation = [[0.0; 3]; 3];

        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, x) in row.iter_mut().enumerate() {
                *x = (0..3).map(|k| b[i][k] * a[k][j]).sum();
            }
        }
        Self {
            rotation,
            shift: other.transform(self.shift),
        }
    }
}

impl Default for CoordTransform {
    fn default() -> Self {
        Self::identity()
    }
}




/**
 * An axis-aligned box in the inertial frame
 */
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}




// ============================================================================
impl BoundingBox {

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /**
     * Return the smallest box containing all of the given points.
     */
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        points.into_iter().fold(None, |bbox, p| match bbox {
            None => Some(Self::new(p, p)),
            Some(b) => Some(Self::new(b.min.min(p), b.max.max(p))),
        })
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && other.min.x <= self.max.x &&
        self.min.y <= other.max.y && other.min.y <= self.max.y &&
        self.min.z <= other.max.z && other.min.z <= self.max.z
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{BoundingBox, CoordTransform, Vec3};

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn translation_round_trips_a_point() {
        let t = CoordTransform::from_origin(Vec3::new(1.0, 2.0, 3.0));
        let p = Vec3::new(1.5, 2.5, 3.5);
        assert!(close(t.transform(p), Vec3::new(0.5, 0.5, 0.5)));
        assert!(close(t.transform_reverse(t.transform(p)), p));
    }

    #[test]
    fn rotated_frame_maps_base_vectors_to_unit_axes() {
        let t = CoordTransform::from_base_ij(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0));
        assert!(close(t.transform(Vec3::new(1.0, 0.0, 0.0)), Vec3::default()));
        assert!(close(t.transform(Vec3::new(1.0, 2.0, 0.0)), Vec3::new(2.0, 0.0, 0.0)));
        assert!(close(t.transform(Vec3::new(0.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 0.0)));
        assert!(close(t.transfree(Vec3::new(0.0, 0.0, 1.0)), Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn composed_transform_equals_sequential_application() {
        let a = CoordTransform::from_base_ij(Vec3::new(0.3, -1.0, 2.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let b = CoordTransform::from_origin(Vec3::new(-4.0, 0.5, 0.25));
        let c = a.inverse().then(&b);
        let p = Vec3::new(0.7, 0.1, -0.2);
        assert!(close(c.transform(p), b.transform(a.transform_reverse(p))));
        assert!(close(a.inverse().transform(a.transform(p)), p));
    }

    #[test]
    fn scaled_frames_keep_their_orientation() {
        let t = CoordTransform::from_base_ij(Vec3::new(1.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let s = t.scaled(2.0);
        assert!(close(s.transform(Vec3::new(2.0, 4.0, 0.0)), Vec3::default()));
        assert!(close(s.transform(Vec3::new(2.0, 6.0, 0.0)), Vec3::new(2.0, 0.0, 0.0)));
        assert!(close(s.transfree(Vec3::new(1.0, 0.0, 0.0)), t.transfree(Vec3::new(1.0, 0.0, 0.0))));
    }

    #[test]
    fn bounding_boxes_overlap_when_touching() {
        let a = BoundingBox::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = BoundingBox::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.union(&c).max, Vec3::new(2.0, 1.0, 1.0));
    }
}
