use std::collections::BTreeSet;




/**
 * The donor relationships found between the patches of a grid. An edge
 * `(donor, receiver)` means that patch `donor` interpolates data into
 * receive cells of patch `receiver`. Edges are indexed both ways, so that
 * the donors of a patch and the receivers of a patch come out in ascending
 * order without sorting.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DonorGraph {
    by_donor: BTreeSet<(usize, usize)>,
    by_receiver: BTreeSet<(usize, usize)>,
}




// ============================================================================
impl DonorGraph {


    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_edges(&self) -> usize {
        self.by_donor.len()
    }

    pub fn clear(&mut self) {
        self.by_donor.clear();
        self.by_receiver.clear();
    }


    /**
     * Record that `donor` serves `receiver`. Recording an edge twice has no
     * effect.
     */
    pub fn insert(&mut self, donor: usize, receiver: usize) {
        self.by_donor.insert((donor, receiver));
        self.by_receiver.insert((receiver, donor));
    }

    pub fn contains(&self, donor: usize, receiver: usize) -> bool {
        self.by_donor.contains(&(donor, receiver))
    }


    /**
     * Return the patches served by `donor`.
     */
    pub fn receivers_of(&self, donor: usize) -> impl Iterator<Item = usize> + '_ {
        self.by_donor.range((donor, 0)..=(donor, usize::MAX)).map(|&(_, r)| r)
    }


    /**
     * Return the patches donating into `receiver`.
     */
    pub fn donors_of(&self, receiver: usize) -> impl Iterator<Item = usize> + '_ {
        self.by_receiver.range((receiver, 0)..=(receiver, usize::MAX)).map(|&(_, d)| d)
    }


    /**
     * Return all (donor, receiver) edges, ordered by donor.
     */
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.by_donor.iter().copied()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::DonorGraph;

    #[test]
    fn edges_are_directed_and_recorded_once() {
        let mut graph = DonorGraph::new();
        graph.insert(0, 1);
        graph.insert(1, 0);
        graph.insert(0, 1);
        assert!(graph.contains(0, 1));
        assert!(!graph.contains(1, 2));
        assert_eq!(graph.num_edges(), 2);
        graph.clear();
        assert_eq!(graph.num_edges(), 0);
        assert!(!graph.contains(0, 1));
    }

    #[test]
    fn donors_and_receivers_come_out_in_order() {
        let mut graph = DonorGraph::new();
        graph.insert(3, 0);
        graph.insert(1, 0);
        graph.insert(0, 2);
        graph.insert(0, 1);
        assert_eq!(graph.donors_of(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(graph.receivers_of(0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 0), (3, 0)]);
        assert_eq!(graph.donors_of(7).count(), 0);
    }
}
