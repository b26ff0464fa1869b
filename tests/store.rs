use locusdb::prelude::*;
use rstest::{
    fixture,
    rstest,
};
use tempfile::TempDir;

fn feature(
    chromosome: &str,
    start: PosType,
    end: PosType,
    strand: Strand,
    feature_type: &str,
    name: Option<&str>,
) -> Locus {
    Locus::new(chromosome, start, end, strand)
        .unwrap()
        .with_source(Some("ensembl"))
        .with_feature_type(Some(feature_type))
        .with_name(name)
}

/// A realistic protein-coding gene: one mRNA carrying exons and CDS
/// segments, plus free-form attributes at several levels.
#[fixture]
fn gene() -> Locus {
    let _ = pretty_env_logger::try_init();
    let mut mrna = feature(
        "9",
        66_347_075,
        66_353_052,
        Strand::Reverse,
        "mRNA",
        Some("GRMZM2G158729_T01"),
    )
    .with_attr("biotype", "protein_coding");
    for (start, end) in [
        (66_347_075, 66_347_989),
        (66_348_992, 66_349_089),
        (66_352_758, 66_353_052),
    ] {
        mrna.add_sublocus(
            feature("9", start, end, Strand::Reverse, "exon", None)
                .with_sublocus(
                    feature("9", start, end, Strand::Reverse, "CDS", None)
                        .with_frame(Some(0)),
                ),
        );
    }
    feature(
        "9",
        66_347_075,
        66_353_052,
        Strand::Reverse,
        "gene",
        Some("GRMZM2G158729"),
    )
    .with_attr("Name", "GRMZM2G158729")
    .with_sublocus(mrna)
}

#[rstest]
fn deep_tree_roundtrips(gene: Locus) {
    let mut store = LociStore::open_in_memory().unwrap();
    let lid = store.insert(&gene).unwrap();

    let read = store.get(lid).unwrap();
    assert_eq!(read, gene);

    let mrna = &read.subloci()[0];
    assert_eq!(mrna.subloci().len(), 3);
    assert_eq!(
        mrna.subloci()[0].subloci()[0].feature_type().unwrap().as_str(),
        "CDS"
    );
}

#[rstest]
fn name_lookup_resolves_the_root(gene: Locus) {
    let mut store = LociStore::open_in_memory().unwrap();
    let lid = store.insert(&gene).unwrap();

    assert_eq!(store.resolve_name("GRMZM2G158729").unwrap(), lid);
    assert_eq!(store.get_by_name("GRMZM2G158729").unwrap(), gene);
    // Sub-locus names are not primary lookup keys.
    assert!(!store.contains_name("GRMZM2G158729_T01"));
}

#[rstest]
fn dataset_survives_reopen(gene: Locus) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("loci.db");

    let lid = {
        let mut store = LociStore::open(&path).unwrap();
        store.insert(&gene).unwrap()
    };

    let store = LociStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get(lid).unwrap(), gene);
}

#[test]
fn iter_walks_insertion_order() {
    let mut store = LociStore::open_in_memory().unwrap();
    for (start, end, name) in
        [(210, 300, "gene_d"), (100, 150, "gene_a"), (160, 175, "gene_b")]
    {
        store
            .insert(&feature("1", start, end, Strand::Forward, "gene", Some(name)))
            .unwrap();
    }
    let names: Vec<String> = store
        .iter()
        .unwrap()
        .map(|locus| locus.unwrap().name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["gene_d", "gene_a", "gene_b"]);
}

#[test]
fn failed_insert_keeps_already_written_rows() {
    let mut store = LociStore::open_in_memory().unwrap();
    let bad = feature("1", 100, 500, Strand::Forward, "gene", Some("gene_a"))
        .with_sublocus(feature(
            "1",
            100,
            200,
            Strand::Forward,
            "exon",
            Some("sub_1"),
        ))
        .with_sublocus(
            feature("1", 250, 300, Strand::Forward, "exon", Some("sub_2"))
                .with_attr("k", "v1")
                .with_attr("k", "v2"),
        );

    let err = store.insert(&bad).unwrap_err();
    assert!(matches!(err, LocusError::DuplicateAttr { .. }));

    // Statements autocommit one at a time: the root and the first
    // sub-locus survive the failure.
    assert_eq!(store.count().unwrap(), 1);
    let root = store.get_by_name("gene_a").unwrap();
    assert_eq!(root.subloci()[0].name().unwrap().as_str(), "sub_1");
}

#[test]
fn bulk_insert_is_all_or_nothing() {
    let mut store = LociStore::open_in_memory().unwrap();
    let good = feature("1", 100, 150, Strand::Forward, "gene", Some("gene_a"));
    let bad = feature("1", 160, 175, Strand::Forward, "gene", Some("gene_b"))
        .with_attr("k", "v1")
        .with_attr("k", "v2");

    assert!(store.bulk_insert(&[good.clone(), bad]).is_err());
    assert_eq!(store.count().unwrap(), 0);

    store.bulk_insert(&[good]).unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn insert_many_reports_lids_in_input_order() {
    let mut store = LociStore::open_in_memory().unwrap();
    let loci = vec![
        feature("1", 100, 150, Strand::Forward, "gene", Some("gene_a")),
        feature("2", 100, 150, Strand::Reverse, "gene", Some("gene_e")),
    ];
    let lids = store.insert_many(&loci).unwrap();
    assert_eq!(lids.len(), 2);
    assert_eq!(store.get(lids[0]).unwrap(), loci[0]);
    assert_eq!(store.get(lids[1]).unwrap(), loci[1]);
}
