use std::collections::VecDeque;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::types::{Shape, TypeDescriptor};

/// Embedded records nested deeper than this are not flattened further.
const MAX_EMBEDDING_DEPTH: usize = 32;

/// Where a field's value lives inside the record value, as field indices from the outermost
/// record down through embedded records.
pub(crate) type FieldPath = SmallVec<[usize; 2]>;

#[derive(Clone, Debug)]
pub(crate) struct FieldEntry {
    pub(crate) path: FieldPath,
    pub(crate) ty: TypeDescriptor,
}

/// Name lookup for a record type, with embedded records' fields promoted.
///
/// Fields are collected breadth first, so a field declared directly on the record shadows a
/// same-named field of an embedded record, and a shallower embedding shadows a deeper one.
#[derive(Debug)]
pub(crate) struct FieldTable {
    type_name: String,
    exact: AHashMap<String, FieldEntry>,
    folded: AHashMap<String, FieldEntry>,
}

impl FieldTable {
    pub(crate) fn new(ty: &TypeDescriptor) -> Self {
        let type_name = match ty.shape() {
            Shape::Record(record) => record.name().to_owned(),
            _ => String::new(),
        };
        let mut exact = AHashMap::new();
        let mut folded = AHashMap::new();
        let mut queue: VecDeque<(TypeDescriptor, FieldPath)> = VecDeque::new();
        queue.push_back((ty.clone(), FieldPath::new()));

        while let Some((record, prefix)) = queue.pop_front() {
            for (index, field) in record.fields().iter().enumerate() {
                let mut path = prefix.clone();
                path.push(index);
                // An embedded record is addressable by its own name and also promotes its fields.
                if field.embedded && path.len() < MAX_EMBEDDING_DEPTH {
                    queue.push_back((field.ty.clone(), path.clone()));
                }
                let entry = FieldEntry {
                    path,
                    ty: field.ty.clone(),
                };
                folded
                    .entry(field.name.to_lowercase())
                    .or_insert_with(|| entry.clone());
                exact.entry(field.name.clone()).or_insert(entry);
            }
        }

        Self {
            type_name,
            exact,
            folded,
        }
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Find a field by name. Case-insensitive lookup is a fallback after the exact name.
    pub(crate) fn lookup(&self, name: &str, case_insensitive: bool) -> Option<&FieldEntry> {
        self.exact.get(name).or_else(|| {
            if case_insensitive {
                self.folded.get(&name.to_lowercase())
            } else {
                None
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.exact.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDescriptor, IntWidth};

    fn embedded_pair() -> TypeDescriptor {
        let base = TypeDescriptor::record_with_fields(
            "Base",
            vec![
                FieldDescriptor::new("id", TypeDescriptor::int(IntWidth::I64)),
                FieldDescriptor::new("Name", TypeDescriptor::string()),
            ],
        )
        .unwrap();
        TypeDescriptor::record_with_fields(
            "Derived",
            vec![
                FieldDescriptor::embedded("base", base),
                FieldDescriptor::new("id", TypeDescriptor::string()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn embedded_fields_are_promoted() {
        let table = FieldTable::new(&embedded_pair());
        assert_eq!(table.type_name(), "Derived");
        assert_eq!(table.len(), 3);
        let name = table.lookup("Name", false).unwrap();
        assert_eq!(name.path.as_slice(), &[0, 1]);
        let base = table.lookup("base", false).unwrap();
        assert_eq!(base.path.as_slice(), &[0]);
    }

    #[test]
    fn outer_field_shadows_embedded() {
        let table = FieldTable::new(&embedded_pair());
        let id = table.lookup("id", false).unwrap();
        assert_eq!(id.path.as_slice(), &[1]);
        assert_eq!(id.ty, TypeDescriptor::string());
    }

    #[test]
    fn case_folding_is_opt_in() {
        let table = FieldTable::new(&embedded_pair());
        assert!(table.lookup("name", false).is_none());
        assert_eq!(table.lookup("name", true).unwrap().path.as_slice(), &[0, 1]);
    }

    #[test]
    fn self_embedding_terminates() {
        let node = TypeDescriptor::record("Loop");
        node.define_fields(vec![
            FieldDescriptor::new("x", TypeDescriptor::bool()),
            FieldDescriptor::embedded("inner", node.clone()),
        ])
        .unwrap();
        let table = FieldTable::new(&node);
        assert_eq!(table.lookup("x", false).unwrap().path.as_slice(), &[0]);
    }
}
