use core::ops::Range;
use crate::geometry::{Axis, Face};




#[derive(Clone, Debug, PartialEq, Eq)]


/**
 * Represents a box of cells in the (i, j, k) index space of a patch
 */
pub struct IndexSpace {
    di: Range<usize>,
    dj: Range<usize>,
    dk: Range<usize>,
}




/**
 * Describes a rectangular block of cell indexes. Cells are addressed in
 * row-major order with the final (k) index increasing fastest.
 */
impl IndexSpace {


    pub fn new(di: Range<usize>, dj: Range<usize>, dk: Range<usize>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }


    /**
     * The index space of a whole patch with the given number of cells on
     * each axis.
     */
    pub fn of_size(ni: usize, nj: usize, nk: usize) -> Self {
        Self::new(0..ni, 0..nj, 0..nk)
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.di.end - self.di.start,
         self.dj.end - self.dj.start,
         self.dk.end - self.dk.start)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m, n) = self.dim();
        l * m * n
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the range of indexes along the given axis.
     */
    pub fn range(&self, axis: Axis) -> Range<usize> {
        match axis {
            Axis::I => self.di.clone(),
            Axis::J => self.dj.clone(),
            Axis::K => self.dk.clone(),
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (usize, usize, usize)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1) && self.dk.contains(&index.2)
    }


    /**
     * Trim this index space by the given number of elements on each side of
     * each axis. Axes too short to be trimmed collapse to an empty range.
     */
    pub fn trim_all(&self, delta: usize) -> Self {
        let trim = |r: &Range<usize>| {
            let start = (r.start + delta).min(r.end);
            let end = r.end.saturating_sub(delta).max(start);
            start..end
        };
        Self::new(trim(&self.di), trim(&self.dj), trim(&self.dk))
    }


    /**
     * Return the one-cell thick slab of this index space which lies `layer`
     * cells inward from the given face. The slab is empty if the space is
     * not thick enough.
     */
    pub fn face_layer(&self, face: Face, layer: usize) -> Self {
        let r = self.range(face.axis());
        let slab = if layer >= r.end - r.start {
            r.start..r.start
        } else if face.is_lower() {
            r.start + layer..r.start + layer + 1
        } else {
            r.end - 1 - layer..r.end - layer
        };
        match face.axis() {
            Axis::I => Self::new(slab, self.dj.clone(), self.dk.clone()),
            Axis::J => Self::new(self.di.clone(), slab, self.dk.clone()),
            Axis::K => Self::new(self.di.clone(), self.dj.clone(), slab),
        }
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (usize, usize, usize)) -> usize {
        let (_, m, n) = self.dim();
        let i = index.0 - self.di.start;
        let j = index.1 - self.dj.start;
        let k = index.2 - self.dk.start;
        (i * m + j) * n + k
    }


    /**
     * Invert `row_major_offset`.
     */
    pub fn index_of(&self, offset: usize) -> (usize, usize, usize) {
        let (_, m, n) = self.dim();
        let k = offset % n;
        let j = (offset / n) % m;
        let i = offset / (m * n);
        (i + self.di.start, j + self.dj.start, k + self.dk.start)
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.di.clone().flat_map(move |i| {
            self.dj.clone().flat_map(move |j| self.dk.clone().map(move |k| (i, j, k)))
        })
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::IndexSpace;
    use crate::geometry::Face;

    #[test]
    fn row_major_offset_round_trips() {
        let space = IndexSpace::of_size(4, 3, 5);
        for (n, index) in space.iter().enumerate() {
            assert_eq!(space.row_major_offset(index), n);
            assert_eq!(space.index_of(n), index);
        }
        assert_eq!(space.iter().count(), 60);
    }

    #[test]
    fn face_layers_select_boundary_slabs() {
        let space = IndexSpace::of_size(10, 6, 1);
        assert_eq!(space.face_layer(Face::IMin, 1), IndexSpace::new(1..2, 0..6, 0..1));
        assert_eq!(space.face_layer(Face::IMax, 0), IndexSpace::new(9..10, 0..6, 0..1));
        assert_eq!(space.face_layer(Face::KMax, 0).len(), 60);
        assert!(space.face_layer(Face::KMin, 1).is_empty());
    }

    #[test]
    fn trimming_collapses_thin_axes() {
        let space = IndexSpace::of_size(10, 3, 1).trim_all(2);
        assert_eq!(space.dim(), (6, 0, 0));
        assert!(space.is_empty());
    }
}
