//! Convenience re-exports of the crate's main types.

pub use crate::data_structs::typedef::{
    Lid,
    PosType,
    SeqName,
};
pub use crate::data_structs::{
    AttrValue,
    Locus,
    LocusAttrs,
    Strand,
};
pub use crate::error::{
    LocusError,
    Result,
};
pub use crate::index::{
    SpatialEntry,
    SpatialIndex,
};
pub use crate::query::{
    FlankOpts,
    LocusHits,
    WithinOpts,
};
pub use crate::store::{
    LociDb,
    LociStore,
};
