//! Paths inside a value under construction.
//!
//! Two flavours live here:
//! - [`Slot`] / [`SlotPath`]: positional steps used internally to reach a slot inside a
//!   partially built [`Value`](crate::Value) (list index, map entry key or value, record field,
//!   optional payload). Marker locations and pending reference patches are expressed this way.
//! - [`BuildPath`]: a human-readable path (`$.servers[2].port`) attached to errors so the
//!   caller can see where in the document a build step failed.

use std::fmt;

use smallvec::SmallVec;

/// One positional step into a container value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    /// Element of a list, fixed-size array, markup contents or node children.
    Index(usize),
    /// Key of the n-th map (or markup attribute) entry.
    EntryKey(usize),
    /// Value of the n-th map (or markup attribute) entry.
    EntryValue(usize),
    /// n-th field of a record; also the n-th component of an edge or the payload of a node.
    Field(usize),
    /// Payload of a present optional.
    Inner,
}

pub(crate) type SlotPath = SmallVec<[Slot; 4]>;

/// Prefix `path` with `prefix`.
pub(crate) fn join(prefix: &[Slot], path: &[Slot]) -> SlotPath {
    let mut joined = SlotPath::with_capacity(prefix.len() + path.len());
    joined.extend_from_slice(prefix);
    joined.extend_from_slice(path);
    joined
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathKind {
    Key,
    Index,
}

/// One human-readable step of a [`BuildPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub kind: PathKind,
    pub name: String,
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        Self {
            kind: PathKind::Key,
            name: value.to_owned(),
        }
    }
}

impl From<String> for PathSegment {
    fn from(value: String) -> Self {
        Self {
            kind: PathKind::Key,
            name: value,
        }
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        Self {
            kind: PathKind::Index,
            name: value.to_string(),
        }
    }
}

/// Location of a failing build step, from the document root down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BuildPath {
    segments: Vec<PathSegment>,
}

impl BuildPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment.kind {
                PathKind::Index => write!(f, "[{}]", segment.name)?,
                PathKind::Key => write!(f, ".{}", segment.name)?,
            }
        }
        Ok(())
    }
}
