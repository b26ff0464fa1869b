use arcstr::ArcStr;

/// Genomic base-pair position.
pub type PosType = u32;

/// Locus identifier, assigned by the store at insertion time.
///
/// LIDs are positive, monotonically increasing and never reused; primary
/// loci and sub-loci draw from one dataset-scoped sequence.
pub type Lid = i64;

/// Shared immutable string used for chromosome names, sources, feature
/// types and locus names.
pub type SeqName = ArcStr;
