use crate::geometry::{BoundingBox, Vec3};




/**
 * A uniform 3D bucket grid over a bounding box, used for broad-phase
 * overlap queries. Items (here, patch indexes) are inserted into every
 * bucket their bounding box touches; any two items sharing a bucket are
 * potential neighbors. There is no removal: the raster is rebuilt from
 * scratch whenever the set of items changes.
 */
pub struct HashRaster<T> {
    bbox: BoundingBox,
    shape: (usize, usize, usize),
    delta: Vec3,
    eps: Vec3,
    buckets: Vec<Vec<T>>,
}




// ============================================================================
impl<T: Copy + PartialEq> HashRaster<T> {


    /**
     * Create an empty raster with the given number of buckets on each axis
     * (at least one per axis).
     */
    pub fn new(bbox: BoundingBox, shape: (usize, usize, usize)) -> Self {
        let shape = (shape.0.max(1), shape.1.max(1), shape.2.max(1));
        let extent = bbox.extent();
        let delta = Vec3::new(
            extent.x / shape.0 as f64,
            extent.y / shape.1 as f64,
            extent.z / shape.2 as f64);
        let eps = extent * 1e-10;

        Self {
            bbox,
            shape,
            delta,
            eps,
            buckets: (0..shape.0 * shape.1 * shape.2).map(|_| Vec::new()).collect(),
        }
    }


    /**
     * Create an empty raster aiming at roughly `resolution` buckets in
     * total, with similar physical bucket extents on all axes: the bucket
     * count per axis is proportional to the box extent along it, scaled by
     * the cube root of `resolution` over the box volume. Flat axes get a
     * single bucket.
     */
    pub fn with_resolution(bbox: BoundingBox, resolution: usize) -> Self {
        let extent = bbox.extent();
        let volume = extent.x * extent.y * extent.z;

        let shape = if volume > 0.0 {
            let per_length = (resolution as f64 / volume).cbrt();
            ((per_length * extent.x) as usize,
             (per_length * extent.y) as usize,
             (per_length * extent.z) as usize)
        } else {
            (1, 1, 1)
        };
        Self::new(bbox, shape)
    }


    /**
     * Return the number of buckets on each axis.
     */
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }


    /**
     * Map a point to the bucket containing it, or `None` if the point is
     * outside the raster box (beyond a small round-off tolerance). Points on
     * the upper box faces belong to the last bucket.
     */
    pub fn xyz_to_ref_node(&self, p: Vec3) -> Option<(usize, usize, usize)> {
        let locate = |x: f64, min: f64, max: f64, delta: f64, eps: f64, n: usize| {
            if x < min - eps || x > max + eps {
                None
            } else if delta > 0.0 {
                Some((((x - min) / delta).max(0.0) as usize).min(n - 1))
            } else {
                Some(0)
            }
        };
        let (b, d, e) = (&self.bbox, &self.delta, &self.eps);
        let i = locate(p.x, b.min.x, b.max.x, d.x, e.x, self.shape.0)?;
        let j = locate(p.y, b.min.y, b.max.y, d.y, e.y, self.shape.1)?;
        let k = locate(p.z, b.min.z, b.max.z, d.z, e.z, self.shape.2)?;
        Some((i, j, k))
    }


    /**
     * Return the linear bucket index of a bucket triple.
     */
    pub fn bucket_index(&self, index: (usize, usize, usize)) -> usize {
        (index.0 * self.shape.1 + index.1) * self.shape.2 + index.2
    }


    /**
     * Insert an item into a single bucket. Re-inserting an item already in
     * the bucket has no effect.
     */
    pub fn insert(&mut self, index: (usize, usize, usize), item: T) {
        let l = self.bucket_index(index);
        let bucket = &mut self.buckets[l];

        if !bucket.contains(&item) {
            bucket.push(item)
        }
    }


    /**
     * Insert an item into every bucket in the inclusive range of bucket
     * triples `lower..=upper`.
     */
    pub fn insert_range(&mut self, lower: (usize, usize, usize), upper: (usize, usize, usize), item: T) {
        for i in lower.0..=upper.0 {
            for j in lower.1..=upper.1 {
                for k in lower.2..=upper.2 {
                    self.insert((i, j, k), item)
                }
            }
        }
    }


    /**
     * Return an iterator over all the buckets of the raster.
     */
    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        self.buckets.iter().map(|b| b.as_slice())
    }
}
