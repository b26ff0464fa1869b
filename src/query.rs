//! Strand-aware spatial queries over a [`LociStore`].
//!
//! Every query is a pure function of the store contents and its arguments:
//! candidate LIDs come from the spatial index, records are resolved lazily
//! through the store, and ordering follows the 5'→3' direction of the query
//! locus. The anchor boundary used by the overlap test and the sort key are
//! coupled (start-anchored tests order by start, end-anchored tests by
//! end), so "nearest" stays well-defined under partial overlap; both are
//! derived from the scan orientation in one place
//! ([`LociStore::candidate_lids`]).

use std::collections::VecDeque;
use std::iter::Take;

use crate::data_structs::typedef::{
    Lid,
    PosType,
};
use crate::data_structs::{
    Locus,
    Strand,
};
use crate::error::{
    LocusError,
    Result,
};
use crate::store::LociStore;

/// Options for [`LociStore::within`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WithinOpts {
    partial: bool,
    ignore_strand: bool,
    same_strand: bool,
}

impl WithinOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also match loci anchored over the window boundary instead of only
    /// loci strictly inside it.
    pub fn with_partial(
        mut self,
        partial: bool,
    ) -> Self {
        self.partial = partial;
        self
    }

    /// Scan as if the query locus were on the forward strand. Mutually
    /// exclusive with `same_strand`.
    pub fn with_ignore_strand(
        mut self,
        ignore_strand: bool,
    ) -> Self {
        self.ignore_strand = ignore_strand;
        self
    }

    /// Keep only candidates on the query locus's strand (post-filter).
    pub fn with_same_strand(
        mut self,
        same_strand: bool,
    ) -> Self {
        self.same_strand = same_strand;
        self
    }
}

/// Options for [`LociStore::upstream_loci`], [`LociStore::downstream_loci`]
/// and [`LociStore::flanking_loci`].
#[derive(Debug, Clone, Copy)]
pub struct FlankOpts {
    n: Option<usize>,
    max_distance: PosType,
    partial: bool,
    same_strand: bool,
    force_strand: Option<Strand>,
}

impl Default for FlankOpts {
    fn default() -> Self {
        Self {
            n: None,
            max_distance: PosType::MAX,
            partial: false,
            same_strand: false,
            force_strand: None,
        }
    }
}

impl FlankOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of returned loci. Unbounded by default; `n` and
    /// `max_distance` are independent caps and whichever is reached first
    /// stops the sequence.
    pub fn with_n(
        mut self,
        n: Option<usize>,
    ) -> Self {
        self.n = n;
        self
    }

    /// Caps the probe distance from the locus boundary, in base pairs.
    pub fn with_max_distance(
        mut self,
        max_distance: PosType,
    ) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_partial(
        mut self,
        partial: bool,
    ) -> Self {
        self.partial = partial;
        self
    }

    /// Keep only candidates on the query locus's strand (post-filter).
    pub fn with_same_strand(
        mut self,
        same_strand: bool,
    ) -> Self {
        self.same_strand = same_strand;
        self
    }

    /// Overrides the query locus's strand when orienting the probe.
    pub fn with_force_strand(
        mut self,
        force_strand: Option<Strand>,
    ) -> Self {
        self.force_strand = force_strand;
        self
    }
}

/// Scan orientation of a query: the 5'→3' direction results are yielded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Forward,
    Reverse,
}

/// Lazy sequence of query hits.
///
/// Candidate LIDs are fixed up front; records are resolved through the
/// store one at a time, and abandoning the iterator early releases
/// everything. Re-run the query to restart.
pub struct LocusHits<'a> {
    store: &'a LociStore,
    lids: VecDeque<Lid>,
    strand_filter: Option<Strand>,
}

impl<'a> LocusHits<'a> {
    fn new(
        store: &'a LociStore,
        lids: Vec<Lid>,
        strand_filter: Option<Strand>,
    ) -> Self {
        Self {
            store,
            lids: lids.into(),
            strand_filter,
        }
    }
}

impl Iterator for LocusHits<'_> {
    type Item = Result<Locus>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(lid) = self.lids.pop_front() {
            match self.store.get(lid) {
                Ok(locus) => {
                    if let Some(strand) = self.strand_filter {
                        if locus.strand() != strand {
                            continue;
                        }
                    }
                    return Some(Ok(locus));
                },
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.lids.len()))
    }
}

impl LociStore {
    /// Returns the loci inside the boundaries of `locus`, nearest first
    /// along the query's 5'→3' direction.
    ///
    /// With `partial = false` a hit must lie strictly inside
    /// `(locus.start, locus.end)`; with `partial = true` a hit's anchor
    /// boundary (start when scanning forward, end when scanning reverse)
    /// must fall inside the window, so loci hanging over the far edge
    /// still qualify.
    ///
    /// Fails fast with a configuration error when `ignore_strand` and
    /// `same_strand` are both set, and with [`LocusError::Strand`] when the
    /// query locus is unstranded and `ignore_strand` is not set.
    pub fn within<'a>(
        &'a self,
        locus: &Locus,
        opts: &WithinOpts,
    ) -> Result<LocusHits<'a>> {
        if opts.ignore_strand && opts.same_strand {
            return Err(LocusError::ConflictingFlags(
                "`ignore_strand` and `same_strand` cannot both be set",
            ));
        }
        let orientation = if opts.ignore_strand {
            Orientation::Forward
        }
        else {
            match locus.strand() {
                Strand::Forward => Orientation::Forward,
                Strand::Reverse => Orientation::Reverse,
                Strand::None => {
                    return Err(LocusError::Strand(char::from(locus.strand())))
                },
            }
        };
        let lids = self.candidate_lids(
            locus.chromosome(),
            locus.start(),
            locus.end(),
            opts.partial,
            orientation,
        )?;
        let strand_filter = opts.same_strand.then(|| locus.strand());
        Ok(LocusHits::new(self, lids, strand_filter))
    }

    /// Returns the loci upstream (before the 5' end) of `locus`, nearest
    /// first, regardless of `+`/`-` orientation.
    pub fn upstream_loci<'a>(
        &'a self,
        locus: &Locus,
        opts: &FlankOpts,
    ) -> Result<Take<LocusHits<'a>>> {
        let orientation = effective_orientation(locus, opts.force_strand);
        let anchor = match orientation {
            Orientation::Forward => locus.stranded_start(Strand::Forward),
            Orientation::Reverse => locus.stranded_start(Strand::Reverse),
        };
        // The probe strand is inverted so the generic `within` ordering
        // walks away from the locus, nearest first.
        let (start, end, probe_strand) = match orientation {
            Orientation::Forward => (
                anchor.saturating_sub(opts.max_distance),
                anchor,
                Strand::Reverse,
            ),
            Orientation::Reverse => (
                anchor,
                anchor.saturating_add(opts.max_distance),
                Strand::Forward,
            ),
        };
        self.flank_probe(locus, start, end, probe_strand, opts)
    }

    /// Returns the loci downstream (after the 3' end) of `locus`, nearest
    /// first, regardless of `+`/`-` orientation.
    pub fn downstream_loci<'a>(
        &'a self,
        locus: &Locus,
        opts: &FlankOpts,
    ) -> Result<Take<LocusHits<'a>>> {
        let orientation = effective_orientation(locus, opts.force_strand);
        let anchor = match orientation {
            Orientation::Forward => locus.stranded_end(Strand::Forward),
            Orientation::Reverse => locus.stranded_end(Strand::Reverse),
        };
        let (start, end, probe_strand) = match orientation {
            Orientation::Forward => (
                anchor,
                anchor.saturating_add(opts.max_distance),
                Strand::Forward,
            ),
            Orientation::Reverse => (
                anchor.saturating_sub(opts.max_distance),
                anchor,
                Strand::Reverse,
            ),
        };
        self.flank_probe(locus, start, end, probe_strand, opts)
    }

    /// Returns the (upstream, downstream) pair with shared options.
    #[allow(clippy::type_complexity)]
    pub fn flanking_loci<'a>(
        &'a self,
        locus: &Locus,
        opts: &FlankOpts,
    ) -> Result<(Take<LocusHits<'a>>, Take<LocusHits<'a>>)> {
        Ok((
            self.upstream_loci(locus, opts)?,
            self.downstream_loci(locus, opts)?,
        ))
    }

    /// Returns the primary loci whose span strictly contains `locus`
    /// (`candidate.start < locus.start` and `candidate.end > locus.end`),
    /// on the same chromosome, in ascending start order.
    pub fn encompassing_loci<'a>(
        &'a self,
        locus: &Locus,
    ) -> Result<LocusHits<'a>> {
        let (start, end) = (locus.start(), locus.end());
        let lids = self.with_spatial(|index| {
            let mut hits = index.overlap(locus.chromosome(), start, end);
            hits.retain(|entry| entry.start < start && entry.end > end);
            hits.sort_by_key(|entry| entry.start);
            hits.into_iter().map(|entry| entry.lid).collect::<Vec<_>>()
        })?;
        Ok(LocusHits::new(self, lids, None))
    }

    /// One place owns the anchor/sort-key coupling: scanning forward
    /// anchors and sorts on candidate starts (ascending), scanning reverse
    /// anchors and sorts on candidate ends (descending).
    fn candidate_lids(
        &self,
        chromosome: &str,
        start: PosType,
        end: PosType,
        partial: bool,
        orientation: Orientation,
    ) -> Result<Vec<Lid>> {
        self.with_spatial(|index| {
            let mut hits = index.overlap(chromosome, start, end);
            match (partial, orientation) {
                (false, _) => {
                    hits.retain(|e| e.start > start && e.end < end);
                },
                (true, Orientation::Forward) => {
                    hits.retain(|e| e.start > start && e.start < end);
                },
                (true, Orientation::Reverse) => {
                    hits.retain(|e| e.end > start && e.end < end);
                },
            }
            match orientation {
                Orientation::Forward => {
                    hits.sort_by_key(|e| e.start);
                },
                Orientation::Reverse => {
                    hits.sort_by_key(|e| std::cmp::Reverse(e.end));
                },
            }
            hits.into_iter().map(|e| e.lid).collect()
        })
    }

    fn flank_probe<'a>(
        &'a self,
        locus: &Locus,
        start: PosType,
        end: PosType,
        probe_strand: Strand,
        opts: &FlankOpts,
    ) -> Result<Take<LocusHits<'a>>> {
        // Collapses at chromosome boundaries or with a zero max_distance.
        let probe =
            Locus::new(locus.chromosome().clone(), start, end, probe_strand)?;
        let mut hits = self.within(
            &probe,
            &WithinOpts::new().with_partial(opts.partial),
        )?;
        hits.strand_filter = opts.same_strand.then(|| locus.strand());
        Ok(hits.take(opts.n.unwrap_or(usize::MAX)))
    }

    // ------------------------------------------------------------------
    //       Batch entry points
    // ------------------------------------------------------------------
    //
    // Each maps the single-locus operation over a sequence, collecting
    // eagerly in input order and failing fast on the first error.

    pub fn within_many(
        &self,
        loci: &[Locus],
        opts: &WithinOpts,
    ) -> Result<Vec<Vec<Locus>>> {
        loci.iter()
            .map(|locus| self.within(locus, opts)?.collect())
            .collect()
    }

    pub fn upstream_loci_many(
        &self,
        loci: &[Locus],
        opts: &FlankOpts,
    ) -> Result<Vec<Vec<Locus>>> {
        loci.iter()
            .map(|locus| self.upstream_loci(locus, opts)?.collect())
            .collect()
    }

    pub fn downstream_loci_many(
        &self,
        loci: &[Locus],
        opts: &FlankOpts,
    ) -> Result<Vec<Vec<Locus>>> {
        loci.iter()
            .map(|locus| self.downstream_loci(locus, opts)?.collect())
            .collect()
    }

    #[allow(clippy::type_complexity)]
    pub fn flanking_loci_many(
        &self,
        loci: &[Locus],
        opts: &FlankOpts,
    ) -> Result<Vec<(Vec<Locus>, Vec<Locus>)>> {
        loci.iter()
            .map(|locus| {
                let (up, down) = self.flanking_loci(locus, opts)?;
                Ok((up.collect::<Result<_>>()?, down.collect::<Result<_>>()?))
            })
            .collect()
    }

    pub fn encompassing_loci_many(
        &self,
        loci: &[Locus],
    ) -> Result<Vec<Vec<Locus>>> {
        loci.iter()
            .map(|locus| self.encompassing_loci(locus)?.collect())
            .collect()
    }
}

fn effective_orientation(
    locus: &Locus,
    force_strand: Option<Strand>,
) -> Orientation {
    match force_strand.unwrap_or_else(|| locus.strand()) {
        Strand::Reverse => Orientation::Reverse,
        // An unstranded locus orients as forward.
        Strand::Forward | Strand::None => Orientation::Forward,
    }
}
