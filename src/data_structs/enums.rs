use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

/// Strand of a genomic feature.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Default)]
pub enum Strand {
    /// Forward strand (`+`).
    Forward,
    /// Reverse strand (`-`).
    Reverse,
    /// No strand (`.`).
    #[default]
    None,
}

impl Strand {
    /// Returns the opposite strand. Unstranded stays unstranded.
    pub fn invert(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
            Strand::None => Strand::None,
        }
    }

    pub fn is_stranded(self) -> bool {
        !matches!(self, Strand::None)
    }
}

impl FromStr for Strand {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Ok(Strand::None),
        }
    }
}

impl From<Strand> for char {
    fn from(value: Strand) -> Self {
        match value {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::None => '.',
        }
    }
}

impl From<char> for Strand {
    fn from(value: char) -> Self {
        match value {
            '+' => Strand::Forward,
            '-' => Strand::Reverse,
            _ => Strand::None,
        }
    }
}

impl From<Option<bio::bio_types::strand::Strand>> for Strand {
    fn from(value: Option<bio::bio_types::strand::Strand>) -> Self {
        match value {
            Some(bio::bio_types::strand::Strand::Forward) => Strand::Forward,
            Some(bio::bio_types::strand::Strand::Reverse) => Strand::Reverse,
            _ => Strand::None,
        }
    }
}

impl From<Strand> for Option<bio::bio_types::strand::ReqStrand> {
    fn from(value: Strand) -> Self {
        match value {
            Strand::Forward => Some(bio::bio_types::strand::ReqStrand::Forward),
            Strand::Reverse => Some(bio::bio_types::strand::ReqStrand::Reverse),
            Strand::None => None,
        }
    }
}

impl Display for Strand {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

impl Serialize for Strand {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer, {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Strand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>, {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_char_roundtrip() {
        for strand in [Strand::Forward, Strand::Reverse, Strand::None] {
            assert_eq!(Strand::from(char::from(strand)), strand);
        }
    }

    #[test]
    fn strand_invert() {
        assert_eq!(Strand::Forward.invert(), Strand::Reverse);
        assert_eq!(Strand::Reverse.invert(), Strand::Forward);
        assert_eq!(Strand::None.invert(), Strand::None);
    }
}
