use serde::{Deserialize, Serialize};




/**
 * A sparse linear combination of cell values: the value at some point is
 * `sum(weight_i * data[index_i])`. Entries are not required to be unique
 * while a set is being assembled; the normalization methods below merge
 * duplicates, drop round-off contributors, and pin the weight sum to the
 * value it must have (1 for value interpolation, 0 for gradient stencils).
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedSet {
    entries: Vec<(usize, f64)>,
}




/**
 * A weighted set copied into fixed-size slots. Unused slots carry weight
 * zero and repeat the first index, so they can be evaluated blindly.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedWeights<const N: usize> {
    pub indices: [usize; N],
    pub weights: [f64; N],
    pub len: usize,
}




// ============================================================================
impl WeightedSet {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, f64)> {
        self.entries.iter()
    }

    /**
     * Append a contributor. No uniqueness is enforced here.
     */
    pub fn push_back(&mut self, index: usize, weight: f64) {
        self.entries.push((index, weight))
    }

    /**
     * Append all contributors of another set, scaled by `factor`.
     */
    pub fn concatenate(&mut self, other: &Self, factor: f64) {
        self.entries.extend(other.entries.iter().map(|&(i, w)| (i, w * factor)))
    }

    pub fn weight_sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn max_abs_weight(&self) -> f64 {
        self.entries.iter().fold(0.0, |m, (_, w)| m.max(w.abs()))
    }

    /**
     * Merge duplicate indexes by summing their weights. The result is
     * sorted by index.
     */
    pub fn unify(&mut self) {
        self.entries.sort_by_key(|&(i, _)| i);

        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(self.entries.len());

        for &(i, w) in &self.entries {
            match merged.last_mut() {
                Some((j, v)) if *j == i => *v += w,
                _ => merged.push((i, w)),
            }
        }
        self.entries = merged;
    }

    /**
     * Remove contributors whose weight magnitude is below `eps`. If
     * `use_absolute` is false, `eps` is relative to the largest weight
     * magnitude in the set. If every entry would be removed and
     * `keep_at_least_one` is set, the largest-magnitude entry survives.
     */
    pub fn eliminate_below_eps(&mut self, eps: f64, use_absolute: bool, keep_at_least_one: bool) {
        let threshold = if use_absolute {
            eps
        } else {
            eps * self.max_abs_weight()
        };
        let largest = self
            .entries
            .iter()
            .copied()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

        self.entries.retain(|(_, w)| w.abs() >= threshold);

        if self.entries.is_empty() && keep_at_least_one {
            self.entries.extend(largest)
        }
    }

    /**
     * Shift the weights so that they sum to `target`. The residual is
     * distributed in proportion to the weight magnitudes; if they are all
     * zero it goes entirely to the first entry. Returns false only for an
     * empty set asked to sum to a non-zero target.
     */
    pub fn adjust_weight_sum_shift(&mut self, target: f64) -> bool {
        let residual = target - self.weight_sum();
        let total_abs: f64 = self.entries.iter().map(|(_, w)| w.abs()).sum();

        if self.entries.is_empty() {
            return target == 0.0;
        }
        if total_abs > 0.0 {
            for (_, w) in &mut self.entries {
                *w += residual * w.abs() / total_abs;
            }
        } else {
            self.entries[0].1 += residual;
        }
        true
    }

    /**
     * Copy the contributors into fixed-size arrays. Duplicates are merged
     * first; the copy fails if more than `N` distinct indexes remain.
     */
    pub fn transfer_to_fixed_arrays<const N: usize>(&self) -> Option<FixedWeights<N>> {
        let mut unified = self.clone();
        unified.unify();

        if unified.len() > N || unified.is_empty() {
            return None;
        }
        let first = unified.entries[0].0;
        let mut fixed = FixedWeights {
            indices: [first; N],
            weights: [0.0; N],
            len: unified.len(),
        };
        for (n, &(i, w)) in unified.entries.iter().enumerate() {
            fixed.indices[n] = i;
            fixed.weights[n] = w;
        }
        Some(fixed)
    }

    /**
     * Evaluate the linear combination over a slice of cell values.
     */
    pub fn evaluate(&self, data: &[f64]) -> f64 {
        self.entries.iter().map(|&(i, w)| w * data[i]).sum()
    }
}

impl<const N: usize> FixedWeights<N> {
    pub fn evaluate(&self, data: &[f64]) -> f64 {
        self.indices.iter().zip(&self.weights).map(|(&i, &w)| w * data[i]).sum()
    }
}

impl FromIterator<(usize, f64)> for WeightedSet {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::WeightedSet;

    #[test]
    fn unify_merges_duplicates_and_is_idempotent() {
        let mut ws: WeightedSet = vec![(3, 0.25), (1, 0.5), (3, 0.25), (1, -0.125)].into_iter().collect();
        ws.unify();
        assert_eq!(ws, vec![(1, 0.375), (3, 0.5)].into_iter().collect());
        let once = ws.clone();
        ws.unify();
        assert_eq!(ws, once);
    }

    #[test]
    fn concatenation_scales_the_appended_set() {
        let mut ws: WeightedSet = vec![(0, 1.0)].into_iter().collect();
        let other: WeightedSet = vec![(0, 0.5), (2, -1.0)].into_iter().collect();
        ws.concatenate(&other, 4.0);
        assert_eq!(ws.len(), 3);
        ws.unify();
        assert_eq!(ws, vec![(0, 3.0), (2, -4.0)].into_iter().collect());
    }

    #[test]
    fn elimination_is_relative_to_the_largest_weight() {
        let mut ws: WeightedSet = vec![(0, 1.0), (1, 1e-6), (2, 0.5)].into_iter().collect();
        ws.eliminate_below_eps(1e-4, false, false);
        assert_eq!(ws.len(), 2);

        let mut ws: WeightedSet = vec![(0, 100.0), (1, 1e-3)].into_iter().collect();
        ws.eliminate_below_eps(1e-4, true, false);
        assert_eq!(ws.len(), 2);
    }

    #[test]
    fn elimination_keeps_the_largest_entry_when_asked() {
        let mut ws: WeightedSet = vec![(0, 1e-9), (1, -3e-9), (2, 2e-9)].into_iter().collect();
        ws.eliminate_below_eps(1e-4, true, true);
        assert_eq!(ws, vec![(1, -3e-9)].into_iter().collect());

        let mut ws: WeightedSet = vec![(0, 1e-9)].into_iter().collect();
        ws.eliminate_below_eps(1e-4, true, false);
        assert!(ws.is_empty());
    }

    #[test]
    fn weight_sum_can_be_forced_to_one_and_zero() {
        let mut ws: WeightedSet = vec![(0, 0.3), (1, 0.6)].into_iter().collect();
        assert!(ws.adjust_weight_sum_shift(1.0));
        assert!((ws.weight_sum() - 1.0).abs() < 1e-14);

        let mut ws: WeightedSet = vec![(0, 2.0), (1, -2.1), (2, 0.05)].into_iter().collect();
        assert!(ws.adjust_weight_sum_shift(0.0));
        assert!(ws.weight_sum().abs() < 1e-14);

        let mut ws: WeightedSet = vec![(4, 0.0), (5, 0.0)].into_iter().collect();
        assert!(ws.adjust_weight_sum_shift(1.0));
        assert_eq!(ws.iter().next(), Some(&(4, 1.0)));

        assert!(WeightedSet::new().adjust_weight_sum_shift(0.0));
        assert!(!WeightedSet::new().adjust_weight_sum_shift(1.0));
    }

    #[test]
    fn fixed_arrays_reject_scattered_sets() {
        let ws: WeightedSet = (0..9).map(|i| (i, 1.0 / 9.0)).collect();
        assert!(ws.transfer_to_fixed_arrays::<8>().is_none());

        let ws: WeightedSet = (0..9).map(|i| (i % 4, 0.25)).collect();
        let fixed = ws.transfer_to_fixed_arrays::<8>().unwrap();
        assert_eq!(fixed.len, 4);
        assert_eq!(fixed.weights[4..], [0.0; 4]);
        assert!((fixed.evaluate(&[1.0, 2.0, 3.0, 4.0]) - ws.evaluate(&[1.0, 2.0, 3.0, 4.0])).abs() < 1e-14);
    }
}
