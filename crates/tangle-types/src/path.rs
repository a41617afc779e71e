use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Offset added to an index to mark it hardened in its 32-bit encoding.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// One level of a [`DerivationPath`].
///
/// `index` is always below [`HARDENED_OFFSET`]; hardening is carried by the
/// flag, not by the high bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    index: u32,
    hardened: bool,
}

impl Segment {
    /// A hardened segment (`index'`).
    pub fn hardened(index: u32) -> Result<Self, TypeError> {
        Self::new(index, true)
    }

    /// A non-hardened segment (`index`).
    pub fn normal(index: u32) -> Result<Self, TypeError> {
        Self::new(index, false)
    }

    fn new(index: u32, hardened: bool) -> Result<Self, TypeError> {
        if index >= HARDENED_OFFSET {
            return Err(TypeError::InvalidPath(format!(
                "segment index {index} exceeds {}",
                HARDENED_OFFSET - 1
            )));
        }
        Ok(Self { index, hardened })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl FromStr for Segment {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix('\'').or_else(|| s.strip_suffix('h')) {
            Some(d) => (d, true),
            None => (s, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidPath(format!("malformed segment {s:?}")));
        }
        let index: u32 = digits
            .parse()
            .map_err(|_| TypeError::InvalidPath(format!("segment {s:?} out of range")))?;
        Self::new(index, hardened)
    }
}

/// Hierarchical derivation path such as `m/0'/0'`.
///
/// Paths are immutable: [`extend`](Self::extend) and friends return a new
/// path and leave the receiver untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    segments: Vec<Segment>,
}

impl DerivationPath {
    /// The root path `m`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path with `segment` appended.
    pub fn extend(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    /// A new path with a hardened `index'` appended.
    pub fn child(&self, index: u32) -> Result<Self, TypeError> {
        Ok(self.extend(Segment::hardened(index)?))
    }

    /// Address chain below an account path: `0'` for public addresses,
    /// `1'` for internal (change) addresses.
    pub fn chain(&self, internal: bool) -> Self {
        let segment = Segment {
            index: u32::from(internal),
            hardened: true,
        };
        self.extend(segment)
    }

    /// Full path of address `index` on the given chain of this account.
    pub fn address(&self, internal: bool, index: u32) -> Result<Self, TypeError> {
        self.chain(internal).child(index)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => return Err(TypeError::InvalidPath(format!("path {s:?} must start with 'm'"))),
        }
        let segments = parts.map(Segment::from_str).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
