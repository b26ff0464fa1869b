//! Dataset-scoped locus identifier allocation.
//!
//! LIDs come from a single durable sequence shared by primary loci and
//! sub-loci, so an identifier is never reused and never collides across the
//! two scopes. Holes are permitted; allocation is monotonic.

use rusqlite::Connection;

use crate::data_structs::typedef::Lid;
use crate::error::Result;

/// Allocates the next LID and advances the sequence.
pub(crate) fn next_lid(conn: &Connection) -> Result<Lid> {
    let lid: Lid = conn.query_row(
        "SELECT next_lid FROM lid_alloc WHERE id = 0",
        [],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE lid_alloc SET next_lid = next_lid + 1 WHERE id = 0",
        [],
    )?;
    Ok(lid)
}
