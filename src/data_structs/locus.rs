use std::fmt::{
    self,
    Display,
};

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use super::enums::Strand;
use super::typedef::{
    PosType,
    SeqName,
};
use crate::error::{
    LocusError,
    Result,
};

/// Value of a free-form locus attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Num(f64),
    Str(String),
}

impl Display for AttrValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            AttrValue::Num(n) => write!(f, "{}", n),
            AttrValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Num(value)
    }
}

/// Key/value attributes of a locus.
///
/// Keys are unique per persisted locus, but uniqueness is enforced by the
/// storage layer, not here: a duplicate key inserted in memory surfaces as a
/// [`LocusError::DuplicateAttr`](crate::error::LocusError) constraint
/// violation when the locus is persisted. Equality ignores insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocusAttrs(Vec<(SeqName, AttrValue)>);

impl LocusAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key/value pair without checking for duplicates.
    pub fn insert<K: Into<SeqName>, V: Into<AttrValue>>(
        &mut self,
        key: K,
        value: V,
    ) {
        self.0.push((key.into(), value.into()));
    }

    /// Returns the first value stored under `key`.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&AttrValue> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeqName, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for LocusAttrs {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        let sorted = |attrs: &Self| {
            attrs
                .0
                .iter()
                .cloned()
                .sorted_by(|(a, _), (b, _)| a.cmp(b))
                .collect_vec()
        };
        sorted(self) == sorted(other)
    }
}

impl<K: Into<SeqName>, V: Into<AttrValue>> FromIterator<(K, V)> for LocusAttrs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// One genomic feature: an interval on a chromosome plus descriptive fields,
/// free-form attributes and an ordered tree of sub-features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locus {
    chromosome: SeqName,
    start: PosType,
    end: PosType,
    strand: Strand,
    frame: Option<u8>,
    source: Option<SeqName>,
    feature_type: Option<SeqName>,
    name: Option<SeqName>,
    attrs: LocusAttrs,
    subloci: Vec<Locus>,
}

impl Locus {
    /// Creates a new locus spanning `[start, end]` on `chromosome`.
    ///
    /// Fails with [`LocusError::ZeroWindow`] for a zero-length span and
    /// [`LocusError::InvalidCoordinates`] when `start > end`.
    pub fn new<C: Into<SeqName>>(
        chromosome: C,
        start: PosType,
        end: PosType,
        strand: Strand,
    ) -> Result<Self> {
        let chromosome = chromosome.into();
        if start == end {
            return Err(LocusError::ZeroWindow {
                chromosome: chromosome.to_string(),
                position: start,
            });
        }
        if start > end {
            return Err(LocusError::InvalidCoordinates { start, end });
        }
        Ok(Self {
            chromosome,
            start,
            end,
            strand,
            frame: None,
            source: None,
            feature_type: None,
            name: None,
            attrs: LocusAttrs::new(),
            subloci: Vec::new(),
        })
    }

    /// Sets the reading frame.
    pub fn with_frame(
        mut self,
        frame: Option<u8>,
    ) -> Self {
        self.frame = frame;
        self
    }

    /// Sets the annotation source.
    pub fn with_source<S: Into<SeqName>>(
        mut self,
        source: Option<S>,
    ) -> Self {
        self.source = source.map(|s| s.into());
        self
    }

    /// Sets the feature type (gene, mRNA, exon, ...).
    pub fn with_feature_type<S: Into<SeqName>>(
        mut self,
        feature_type: Option<S>,
    ) -> Self {
        self.feature_type = feature_type.map(|s| s.into());
        self
    }

    /// Sets the name used as an external lookup key.
    pub fn with_name<S: Into<SeqName>>(
        mut self,
        name: Option<S>,
    ) -> Self {
        self.name = name.map(|s| s.into());
        self
    }

    /// Replaces the attribute set.
    pub fn with_attrs(
        mut self,
        attrs: LocusAttrs,
    ) -> Self {
        self.attrs = attrs;
        self
    }

    /// Appends a single attribute.
    pub fn with_attr<K: Into<SeqName>, V: Into<AttrValue>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.attrs.insert(key, value);
        self
    }

    /// Appends a child feature.
    pub fn add_sublocus(
        &mut self,
        sublocus: Locus,
    ) {
        self.subloci.push(sublocus);
    }

    /// Appends a child feature, builder style.
    pub fn with_sublocus(
        mut self,
        sublocus: Locus,
    ) -> Self {
        self.subloci.push(sublocus);
        self
    }

    pub fn chromosome(&self) -> &SeqName {
        &self.chromosome
    }

    pub fn start(&self) -> PosType {
        self.start
    }

    pub fn end(&self) -> PosType {
        self.end
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn frame(&self) -> Option<u8> {
        self.frame
    }

    pub fn source(&self) -> Option<&SeqName> {
        self.source.as_ref()
    }

    pub fn feature_type(&self) -> Option<&SeqName> {
        self.feature_type.as_ref()
    }

    pub fn name(&self) -> Option<&SeqName> {
        self.name.as_ref()
    }

    pub fn attrs(&self) -> &LocusAttrs {
        &self.attrs
    }

    pub fn subloci(&self) -> &[Locus] {
        &self.subloci
    }

    /// Returns the span length in base pairs.
    pub fn length(&self) -> PosType {
        self.end - self.start
    }

    /// Coordinate of the 5' boundary under `orientation`.
    pub fn stranded_start(
        &self,
        orientation: Strand,
    ) -> PosType {
        match orientation {
            Strand::Reverse => self.end,
            _ => self.start,
        }
    }

    /// Coordinate of the 3' boundary under `orientation`.
    pub fn stranded_end(
        &self,
        orientation: Strand,
    ) -> PosType {
        match orientation {
            Strand::Reverse => self.start,
            _ => self.end,
        }
    }
}

impl Display for Locus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}:{}-{} ({})",
            self.chromosome, self.start, self.end, self.strand
        )
    }
}

impl TryFrom<&bio::io::gff::Record> for Locus {
    type Error = LocusError;

    /// Converts a record produced by a [`bio::io::gff`] reader.
    ///
    /// The `ID` attribute becomes the locus name and the score, when
    /// present, is kept as a `score` attribute. Parent/child assembly is the
    /// producer's responsibility; the converted locus has no subloci.
    fn try_from(record: &bio::io::gff::Record) -> Result<Self> {
        let mut attrs = LocusAttrs::new();
        for (key, value) in record.attributes().flat_iter() {
            attrs.insert(key.as_str(), value.as_str());
        }
        if let Some(score) = record.score() {
            attrs.insert("score", score as f64);
        }
        let name = record
            .attributes()
            .get("ID")
            .map(|id| SeqName::from(id.as_str()));

        Ok(Locus::new(
            record.seqname(),
            *record.start() as PosType,
            *record.end() as PosType,
            Strand::from(record.strand()),
        )?
        .with_source(Some(record.source()))
        .with_feature_type(Some(record.feature_type()))
        .with_frame(record.frame().parse::<u8>().ok())
        .with_name(name)
        .with_attrs(attrs))
    }
}
