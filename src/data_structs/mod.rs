mod enums;
mod locus;
pub mod typedef;

pub use enums::Strand;
pub use locus::{
    AttrValue,
    Locus,
    LocusAttrs,
};
