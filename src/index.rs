//! Spatial index over primary locus positions.
//!
//! One interval tree per chromosome, built from the durable `positions`
//! table. The index is derived data: the store rebuilds it lazily after
//! inserts, and queries never cross chromosomes.

use hashbrown::HashMap;
use itertools::Itertools;
use rust_lapper::{
    Interval,
    Lapper,
};

use crate::data_structs::typedef::{
    Lid,
    PosType,
    SeqName,
};

/// One indexed span: the primary locus it belongs to and its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialEntry {
    pub lid: Lid,
    pub start: PosType,
    pub end: PosType,
}

/// Range index over `(chromosome, start, end)` triples.
///
/// Lookups are average-case sub-linear in the number of indexed loci
/// (interval trees via [`rust_lapper`]).
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    inner: HashMap<SeqName, Lapper<PosType, Lid>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of indexed entries.
    pub fn len(&self) -> usize {
        self.inner.values().map(|lapper| lapper.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all entries on `chromosome` whose span intersects
    /// `[start, end]` (closed coordinates, boundary touch counts).
    pub fn overlap(
        &self,
        chromosome: &str,
        start: PosType,
        end: PosType,
    ) -> Vec<SpatialEntry> {
        self.inner
            .get(chromosome)
            .map(|lapper| {
                lapper
                    .find(start.saturating_sub(1), end.saturating_add(1))
                    .map(|iv| {
                        SpatialEntry {
                            lid: iv.val,
                            start: iv.start,
                            end: iv.stop,
                        }
                    })
                    .collect_vec()
            })
            .unwrap_or_default()
    }

    /// Returns all entries on `chromosome` strictly inside `(start, end)`.
    pub fn contains(
        &self,
        chromosome: &str,
        start: PosType,
        end: PosType,
    ) -> Vec<SpatialEntry> {
        let mut hits = self.overlap(chromosome, start, end);
        hits.retain(|entry| entry.start > start && entry.end < end);
        hits
    }
}

impl FromIterator<(SeqName, SpatialEntry)> for SpatialIndex {
    fn from_iter<T: IntoIterator<Item = (SeqName, SpatialEntry)>>(
        iter: T
    ) -> Self {
        let per_chromosome = iter
            .into_iter()
            .map(|(chromosome, entry)| {
                (chromosome, Interval {
                    start: entry.start,
                    stop: entry.end,
                    val: entry.lid,
                })
            })
            .into_group_map();

        let mut inner = HashMap::with_capacity(per_chromosome.len());
        for (chromosome, intervals) in per_chromosome {
            inner.insert(chromosome, Lapper::new(intervals));
        }
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        lid: Lid,
        start: PosType,
        end: PosType,
    ) -> (SeqName, SpatialEntry) {
        (SeqName::from("1"), SpatialEntry { lid, start, end })
    }

    fn sample() -> SpatialIndex {
        [
            entry(1, 100, 150),
            entry(2, 160, 175),
            entry(3, 180, 200),
            entry(4, 210, 300),
            (SeqName::from("2"), SpatialEntry {
                lid: 5,
                start: 100,
                end: 150,
            }),
        ]
        .into_iter()
        .collect()
    }

    fn lids(entries: Vec<SpatialEntry>) -> Vec<Lid> {
        let mut out = entries.iter().map(|e| e.lid).collect_vec();
        out.sort_unstable();
        out
    }

    #[test]
    fn overlap_is_chromosome_scoped() {
        let index = sample();
        assert_eq!(lids(index.overlap("1", 140, 220)), vec![1, 2, 3, 4]);
        assert_eq!(lids(index.overlap("2", 140, 220)), vec![5]);
        assert!(index.overlap("3", 140, 220).is_empty());
    }

    #[test]
    fn overlap_counts_boundary_touch() {
        let index = sample();
        assert_eq!(lids(index.overlap("1", 150, 155)), vec![1]);
        assert_eq!(lids(index.overlap("1", 155, 160)), vec![2]);
    }

    #[test]
    fn contains_is_strict() {
        let index = sample();
        assert_eq!(lids(index.contains("1", 150, 310)), vec![2, 3, 4]);
        // Boundary-equal spans are not strictly inside.
        assert_eq!(lids(index.contains("1", 160, 175)), Vec::<Lid>::new());
        assert_eq!(lids(index.contains("1", 159, 176)), vec![2]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let shuffled: SpatialIndex = [
            entry(4, 210, 300),
            entry(1, 100, 150),
            entry(3, 180, 200),
            entry(2, 160, 175),
        ]
        .into_iter()
        .collect();
        assert_eq!(lids(shuffled.overlap("1", 140, 220)), vec![1, 2, 3, 4]);
    }
}
