//! Hierarchical genomic locus storage with strand-aware spatial queries.
//!
//! A [`Locus`](data_structs::Locus) is an interval on a chromosome carrying
//! descriptive fields, free-form attributes and an ordered tree of
//! sub-features. Loci persist in a SQLite-backed
//! [`LociStore`](store::LociStore), which hands out durable LIDs and keeps a
//! per-chromosome interval index over primary spans. Query methods
//! (`within`, `upstream_loci`, `downstream_loci`, `flanking_loci`,
//! `encompassing_loci`) resolve and order their hits along the query
//! locus's 5'→3' direction.
//!
//! ```
//! use locusdb::prelude::*;
//!
//! fn main() -> locusdb::error::Result<()> {
//!     let mut store = LociStore::open_in_memory()?;
//!     let gene = Locus::new("1", 100, 150, Strand::Forward)?
//!         .with_name(Some("gene_a"));
//!     store.insert(&gene)?;
//!
//!     let window = Locus::new("1", 50, 200, Strand::Forward)?;
//!     let hits: Vec<Locus> = store
//!         .within(&window, &WithinOpts::new())?
//!         .collect::<locusdb::error::Result<_>>()?;
//!     assert_eq!(hits, vec![gene]);
//!     Ok(())
//! }
//! ```

pub mod data_structs;
pub mod error;
pub mod index;
pub mod query;
pub mod store;

pub mod prelude;
