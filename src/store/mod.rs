//! Durable locus storage.
//!
//! [`LociStore`] persists whole locus trees (root, attributes, nested
//! sub-loci and the root's spatial entry) and reconstructs them by LID or
//! by name. It keeps the spatial index synchronized by invalidating the
//! in-memory interval trees on every insert; they are rebuilt lazily from
//! the `positions` table on the next query.

mod allocator;
mod db;

use std::cell::RefCell;

use hashbrown::HashMap;
use rusqlite::{
    params,
    Connection,
    OptionalExtension,
};

pub use self::db::LociDb;
use crate::data_structs::typedef::{
    Lid,
    PosType,
    SeqName,
};
use crate::data_structs::{
    AttrValue,
    Locus,
    LocusAttrs,
    Strand,
};
use crate::error::{
    LocusError,
    Result,
};
use crate::index::{
    SpatialEntry,
    SpatialIndex,
};

/// Hierarchical locus store over a [`LociDb`] dataset.
///
/// A store handle is single-threaded (one handle per thread, each over its
/// own connection); one logical writer performs inserts while readers run
/// concurrently under the database's isolation.
#[derive(Debug)]
pub struct LociStore {
    db: LociDb,
    spatial: RefCell<Option<SpatialIndex>>,
}

impl LociStore {
    /// Opens (creating if needed) a dataset at `path`.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::from_db(LociDb::open(path)?))
    }

    /// Opens a transient in-memory dataset.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_db(LociDb::open_in_memory()?))
    }

    pub fn from_db(db: LociDb) -> Self {
        Self {
            db,
            spatial: RefCell::new(None),
        }
    }

    pub fn db(&self) -> &LociDb {
        &self.db
    }

    /// Persists a locus and its whole sub-locus tree, returning the root
    /// LID.
    ///
    /// Statements autocommit one at a time: on a mid-tree failure (for
    /// example a duplicate attribute key) the rows already written remain
    /// persisted. Use [`bulk_insert`](Self::bulk_insert) for an
    /// all-or-nothing scope.
    pub fn insert(
        &mut self,
        locus: &Locus,
    ) -> Result<Lid> {
        self.invalidate_spatial();
        persist_locus(self.db.conn(), locus)
    }

    /// Inserts each locus independently (autocommit per record), collecting
    /// root LIDs in input order. Fails fast on the first error; records
    /// inserted before it remain persisted.
    pub fn insert_many(
        &mut self,
        loci: &[Locus],
    ) -> Result<Vec<Lid>> {
        loci.iter().map(|locus| self.insert(locus)).collect()
    }

    /// Inserts every locus inside one explicit transaction: either all
    /// trees become visible, or none of them.
    pub fn bulk_insert(
        &mut self,
        loci: &[Locus],
    ) -> Result<Vec<Lid>> {
        self.invalidate_spatial();
        let tx = self.db.transaction()?;
        let mut lids = Vec::with_capacity(loci.len());
        for locus in loci {
            lids.push(persist_locus(&tx, locus)?);
        }
        tx.commit()?;
        log::info!("bulk-inserted {} loci", lids.len());
        Ok(lids)
    }

    /// Reconstructs a primary locus by LID, including attributes and the
    /// full sub-locus tree.
    pub fn get(
        &self,
        lid: Lid,
    ) -> Result<Locus> {
        let conn = self.db.conn();
        let root = read_record(conn, Scope::Loci, lid)?
            .ok_or_else(|| LocusError::MissingLocus(format!("LID {lid}")))?;
        let (mut nodes, children_of) = fetch_subtree(conn, lid)?;
        nodes.insert(lid, root);
        assemble_subtree(&mut nodes, &children_of, lid);
        nodes
            .remove(&lid)
            .ok_or_else(|| LocusError::MissingLocus(format!("LID {lid}")))
    }

    /// Reconstructs a sub-locus by LID, including its own nested subtree.
    pub fn get_sublocus(
        &self,
        lid: Lid,
    ) -> Result<Locus> {
        let conn = self.db.conn();
        let root_lid: Lid = conn
            .query_row(
                "SELECT root_LID FROM subloci WHERE LID = ?1",
                [lid],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                LocusError::MissingLocus(format!("sub-locus LID {lid}"))
            })?;
        let (mut nodes, children_of) = fetch_subtree(conn, root_lid)?;
        assemble_subtree(&mut nodes, &children_of, lid);
        nodes
            .remove(&lid)
            .ok_or_else(|| LocusError::MissingLocus(format!("sub-locus LID {lid}")))
    }

    /// Resolves a primary locus name to its LID (exact match, lowest LID on
    /// duplicates — name uniqueness is not enforced at this layer).
    pub fn resolve_name(
        &self,
        name: &str,
    ) -> Result<Lid> {
        self.db
            .conn()
            .query_row(
                "SELECT LID FROM loci WHERE name = ?1 ORDER BY LID LIMIT 1",
                [name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LocusError::MissingLocus(format!("name '{name}'")))
    }

    pub fn get_by_name(
        &self,
        name: &str,
    ) -> Result<Locus> {
        self.get(self.resolve_name(name)?)
    }

    pub fn contains_name(
        &self,
        name: &str,
    ) -> bool {
        self.resolve_name(name).is_ok()
    }

    /// Returns the number of primary loci.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self.db.conn().query_row(
            "SELECT COUNT(*) FROM loci",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Iterates every primary locus in LID order. Records are resolved
    /// lazily; call again to restart.
    pub fn iter(&self) -> Result<impl Iterator<Item = Result<Locus>> + '_> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT LID FROM loci ORDER BY LID")?;
        let lids = stmt
            .query_map([], |row| row.get::<_, Lid>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lids.into_iter().map(move |lid| self.get(lid)))
    }

    /// Runs `f` against the spatial index, rebuilding it from the
    /// `positions` table if an insert invalidated it.
    pub(crate) fn with_spatial<T>(
        &self,
        f: impl FnOnce(&SpatialIndex) -> T,
    ) -> Result<T> {
        let mut guard = self.spatial.borrow_mut();
        let index = match guard.take() {
            Some(index) => index,
            None => load_spatial(self.db.conn())?,
        };
        let out = f(&index);
        *guard = Some(index);
        Ok(out)
    }

    fn invalidate_spatial(&self) {
        self.spatial.borrow_mut().take();
    }
}

#[derive(Clone, Copy)]
enum Scope {
    Loci,
    Subloci,
}

impl Scope {
    fn attr_insert_sql(self) -> &'static str {
        match self {
            Scope::Loci => {
                "INSERT INTO loci_attrs (LID, key, val) VALUES (?1, ?2, ?3)"
            },
            Scope::Subloci => {
                "INSERT INTO subloci_attrs (LID, key, val) VALUES (?1, ?2, ?3)"
            },
        }
    }

    fn record_select_sql(self) -> &'static str {
        match self {
            Scope::Loci => {
                "SELECT chromosome, start, \"end\", source, feature_type, \
                 strand, frame, name FROM loci WHERE LID = ?1"
            },
            Scope::Subloci => {
                "SELECT chromosome, start, \"end\", source, feature_type, \
                 strand, frame, name FROM subloci WHERE LID = ?1"
            },
        }
    }

    fn attr_select_sql(self) -> &'static str {
        match self {
            Scope::Loci => {
                "SELECT key, val FROM loci_attrs WHERE LID = ?1 ORDER BY rowid"
            },
            Scope::Subloci => {
                "SELECT key, val FROM subloci_attrs WHERE LID = ?1 \
                 ORDER BY rowid"
            },
        }
    }
}

/// Raw row of either locus table, before attribute and subtree attachment.
struct RawRecord {
    chromosome: String,
    start: PosType,
    end: PosType,
    source: Option<String>,
    feature_type: Option<String>,
    strand: String,
    frame: Option<u8>,
    name: Option<String>,
}

impl RawRecord {
    fn into_locus(self) -> Result<Locus> {
        let strand = Strand::from(self.strand.chars().next().unwrap_or('.'));
        Ok(Locus::new(
            self.chromosome.as_str(),
            self.start,
            self.end,
            strand,
        )?
        .with_source(self.source)
        .with_feature_type(self.feature_type)
        .with_frame(self.frame)
        .with_name(self.name))
    }
}

fn read_record(
    conn: &Connection,
    scope: Scope,
    lid: Lid,
) -> Result<Option<Locus>> {
    let raw = conn
        .query_row(scope.record_select_sql(), [lid], |row| {
            Ok(RawRecord {
                chromosome: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
                source: row.get(3)?,
                feature_type: row.get(4)?,
                strand: row.get(5)?,
                frame: row.get(6)?,
                name: row.get(7)?,
            })
        })
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let locus = raw.into_locus()?.with_attrs(read_attrs(conn, scope, lid)?);
    Ok(Some(locus))
}

fn read_attrs(
    conn: &Connection,
    scope: Scope,
    lid: Lid,
) -> Result<LocusAttrs> {
    let mut stmt = conn.prepare(scope.attr_select_sql())?;
    let rows = stmt.query_map([lid], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, AttrValue>(1)?))
    })?;
    let mut attrs = LocusAttrs::new();
    for row in rows {
        let (key, val) = row?;
        attrs.insert(key.as_str(), val);
    }
    Ok(attrs)
}

fn insert_attrs(
    conn: &Connection,
    scope: Scope,
    lid: Lid,
    attrs: &LocusAttrs,
) -> Result<()> {
    for (key, val) in attrs.iter() {
        conn.execute(scope.attr_insert_sql(), params![lid, key.as_str(), val])
            .map_err(|err| match err {
                rusqlite::Error::SqliteFailure(failure, _)
                    if failure.code
                        == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    LocusError::DuplicateAttr {
                        lid,
                        key: key.to_string(),
                    }
                },
                other => LocusError::Db(other),
            })?;
    }
    Ok(())
}

/// Persists a locus tree depth-first via an explicit worklist, then the
/// root's spatial entry. The worklist bounds stack depth for pathologically
/// deep feature trees.
fn persist_locus(
    conn: &Connection,
    locus: &Locus,
) -> Result<Lid> {
    let root_lid = allocator::next_lid(conn)?;
    conn.execute(
        "INSERT INTO loci \
         (LID, chromosome, start, \"end\", source, feature_type, strand, \
         frame, name) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            root_lid,
            locus.chromosome().as_str(),
            locus.start(),
            locus.end(),
            locus.source().map(|s| s.as_str()),
            locus.feature_type().map(|s| s.as_str()),
            String::from(char::from(locus.strand())),
            locus.frame(),
            locus.name().map(|s| s.as_str()),
        ],
    )?;
    insert_attrs(conn, Scope::Loci, root_lid, locus.attrs())?;

    let mut stack: Vec<(Lid, &Locus)> = locus
        .subloci()
        .iter()
        .rev()
        .map(|child| (root_lid, child))
        .collect();
    while let Some((parent_lid, node)) = stack.pop() {
        let lid = allocator::next_lid(conn)?;
        conn.execute(
            "INSERT INTO subloci \
             (LID, root_LID, parent_LID, chromosome, start, \"end\", source, \
             feature_type, strand, frame, name) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                lid,
                root_lid,
                parent_lid,
                node.chromosome().as_str(),
                node.start(),
                node.end(),
                node.source().map(|s| s.as_str()),
                node.feature_type().map(|s| s.as_str()),
                String::from(char::from(node.strand())),
                node.frame(),
                node.name().map(|s| s.as_str()),
            ],
        )?;
        insert_attrs(conn, Scope::Subloci, lid, node.attrs())?;
        for child in node.subloci().iter().rev() {
            stack.push((lid, child));
        }
    }

    conn.execute(
        "INSERT INTO positions (LID, start, \"end\", chromosome) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            root_lid,
            locus.start(),
            locus.end(),
            locus.chromosome().as_str()
        ],
    )?;
    log::debug!("inserted {} as LID {}", locus, root_lid);
    Ok(root_lid)
}

/// Reads every sub-locus of `root_lid` plus the parent/child edge map,
/// with attributes attached and children listed in LID (insertion) order.
fn fetch_subtree(
    conn: &Connection,
    root_lid: Lid,
) -> Result<(HashMap<Lid, Locus>, HashMap<Lid, Vec<Lid>>)> {
    let mut stmt = conn.prepare(
        "SELECT LID, parent_LID, chromosome, start, \"end\", source, \
         feature_type, strand, frame, name FROM subloci \
         WHERE root_LID = ?1 ORDER BY LID",
    )?;
    let rows = stmt.query_map([root_lid], |row| {
        Ok((
            row.get::<_, Lid>(0)?,
            row.get::<_, Lid>(1)?,
            RawRecord {
                chromosome: row.get(2)?,
                start: row.get(3)?,
                end: row.get(4)?,
                source: row.get(5)?,
                feature_type: row.get(6)?,
                strand: row.get(7)?,
                frame: row.get(8)?,
                name: row.get(9)?,
            },
        ))
    })?;

    let mut attrs_by_lid: HashMap<Lid, LocusAttrs> = HashMap::new();
    let mut attr_stmt = conn.prepare(
        "SELECT a.LID, a.key, a.val FROM subloci_attrs a \
         JOIN subloci s ON a.LID = s.LID \
         WHERE s.root_LID = ?1 ORDER BY a.rowid",
    )?;
    let attr_rows = attr_stmt.query_map([root_lid], |row| {
        Ok((
            row.get::<_, Lid>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, AttrValue>(2)?,
        ))
    })?;
    for row in attr_rows {
        let (lid, key, val) = row?;
        attrs_by_lid
            .entry(lid)
            .or_default()
            .insert(key.as_str(), val);
    }

    let mut nodes = HashMap::new();
    let mut children_of: HashMap<Lid, Vec<Lid>> = HashMap::new();
    for row in rows {
        let (lid, parent_lid, raw) = row?;
        let mut locus = raw.into_locus()?;
        if let Some(attrs) = attrs_by_lid.remove(&lid) {
            locus = locus.with_attrs(attrs);
        }
        nodes.insert(lid, locus);
        children_of.entry(parent_lid).or_default().push(lid);
    }
    Ok((nodes, children_of))
}

/// Attaches every descendant of `lid` to its parent, children before
/// parents, so the node under `lid` ends up carrying its full subtree.
fn assemble_subtree(
    nodes: &mut HashMap<Lid, Locus>,
    children_of: &HashMap<Lid, Vec<Lid>>,
    lid: Lid,
) {
    let mut order = Vec::new();
    let mut queue = vec![lid];
    while let Some(current) = queue.pop() {
        order.push(current);
        if let Some(children) = children_of.get(&current) {
            queue.extend(children.iter().copied());
        }
    }
    // Children always carry higher LIDs than their parent, so a descending
    // sweep sees every subtree completed before it is attached.
    order.sort_unstable();
    for current in order.into_iter().rev() {
        let Some(children) = children_of.get(&current) else {
            continue;
        };
        let assembled: Vec<Locus> = children
            .iter()
            .filter_map(|child| nodes.remove(child))
            .collect();
        if let Some(parent) = nodes.get_mut(&current) {
            for child in assembled {
                parent.add_sublocus(child);
            }
        }
    }
}

fn load_spatial(conn: &Connection) -> Result<SpatialIndex> {
    let mut stmt = conn
        .prepare("SELECT LID, start, \"end\", chromosome FROM positions")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            SeqName::from(row.get::<_, String>(3)?),
            SpatialEntry {
                lid: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
            },
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    log::debug!("rebuilding spatial index over {} positions", entries.len());
    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(
        chromosome: &str,
        start: PosType,
        end: PosType,
        name: &str,
    ) -> Locus {
        Locus::new(chromosome, start, end, Strand::Forward)
            .unwrap()
            .with_name(Some(name))
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let mut store = LociStore::open_in_memory().unwrap();
        let gene = locus("1", 100, 200, "gene_a")
            .with_source(Some("ensembl"))
            .with_feature_type(Some("gene"))
            .with_attr("biotype", "protein_coding")
            .with_attr("score", 0.9);
        let lid = store.insert(&gene).unwrap();
        assert_eq!(store.get(lid).unwrap(), gene);
    }

    #[test]
    fn get_missing_lid_fails() {
        let store = LociStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get(42),
            Err(LocusError::MissingLocus(_))
        ));
    }

    #[test]
    fn resolve_name_and_contains() {
        let mut store = LociStore::open_in_memory().unwrap();
        let lid = store.insert(&locus("1", 100, 200, "gene_a")).unwrap();
        assert_eq!(store.resolve_name("gene_a").unwrap(), lid);
        assert!(store.contains_name("gene_a"));
        assert!(!store.contains_name("gene_z"));
        assert!(matches!(
            store.resolve_name("gene_z"),
            Err(LocusError::MissingLocus(_))
        ));
    }

    #[test]
    fn count_tracks_primary_loci_only() {
        let mut store = LociStore::open_in_memory().unwrap();
        let gene = locus("1", 100, 200, "gene_a")
            .with_sublocus(locus("1", 100, 150, "exon_1"));
        store.insert(&gene).unwrap();
        store.insert(&locus("1", 300, 400, "gene_b")).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn sublocus_tree_roundtrips_in_order() {
        let mut store = LociStore::open_in_memory().unwrap();
        let mut transcript = locus("1", 100, 500, "mrna_1");
        for (s, e, n) in
            [(100, 200, "exon_1"), (250, 300, "exon_2"), (400, 500, "exon_3")]
        {
            transcript.add_sublocus(locus("1", s, e, n));
        }
        let gene = locus("1", 100, 500, "gene_a").with_sublocus(transcript);
        let lid = store.insert(&gene).unwrap();
        let read = store.get(lid).unwrap();
        assert_eq!(read, gene);
        let names: Vec<_> = read.subloci()[0]
            .subloci()
            .iter()
            .map(|l| l.name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["exon_1", "exon_2", "exon_3"]);
    }

    #[test]
    fn get_sublocus_reads_nested_scope() {
        let mut store = LociStore::open_in_memory().unwrap();
        let transcript = locus("1", 100, 500, "mrna_1")
            .with_sublocus(locus("1", 100, 200, "exon_1"));
        let gene = locus("1", 100, 500, "gene_a").with_sublocus(transcript);
        let root_lid = store.insert(&gene).unwrap();
        // The transcript is the first sub-locus allocated after the root.
        let sub = store.get_sublocus(root_lid + 1).unwrap();
        assert_eq!(sub.name().unwrap().as_str(), "mrna_1");
        assert_eq!(sub.subloci().len(), 1);
    }

    #[test]
    fn bulk_insert_rolls_back_on_error() {
        let mut store = LociStore::open_in_memory().unwrap();
        let good = locus("1", 100, 200, "gene_a");
        let bad = locus("1", 300, 400, "gene_b")
            .with_attr("k", "v1")
            .with_attr("k", "v2");
        let err = store.bulk_insert(&[good, bad]).unwrap_err();
        assert!(matches!(err, LocusError::DuplicateAttr { .. }));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn lids_never_collide_across_scopes() {
        let mut store = LociStore::open_in_memory().unwrap();
        let gene = locus("1", 100, 500, "gene_a")
            .with_sublocus(locus("1", 100, 200, "exon_1"));
        let first = store.insert(&gene).unwrap();
        let second = store.insert(&locus("1", 600, 700, "gene_b")).unwrap();
        // Root, its sub-locus, then the next root: one shared sequence.
        assert_eq!(second, first + 2);
    }
}
