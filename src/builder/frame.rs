//! The build stack: one frame per container under construction.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::error::{Error, Result};
use crate::markers::FrameId;
use crate::path::{PathKind, PathSegment, Slot, SlotPath};
use crate::tracing_macros::trace;
use crate::types::TypeDescriptor;
use crate::value::Value;

use super::record::FieldPath;
use super::{BuildEnv, Builder, FieldTable};

/// Work left for a frame once its container is complete, applied innermost first.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Finisher {
    /// The container was started through an optional target.
    WrapOptional,
    /// A marker preceded the container; bind it to the finished value.
    Mark(String),
}

/// What a record frame expects next.
pub(crate) enum FieldExpect {
    Name,
    Field {
        name: String,
        path: FieldPath,
        builder: Builder,
    },
    Skip {
        name: String,
    },
}

pub(crate) enum FrameState {
    /// Holds the document's single top-level value.
    Root { builder: Builder, filled: bool },
    List { element: Builder },
    Array {
        element: Builder,
        next: usize,
        len: usize,
    },
    Map {
        key: Builder,
        value: Builder,
        pending_key: Option<usize>,
    },
    Record {
        table: Arc<FieldTable>,
        expect: FieldExpect,
    },
    Markup {
        in_contents: bool,
        pending_key: Option<usize>,
    },
    Edge { filled: usize },
    Node { has_value: bool },
}

/// Result of handing a child value to a frame.
#[derive(Debug)]
pub(crate) enum Accepted {
    /// The value now lives at this path inside the frame's value.
    Stored(SlotPath),
    /// The frame consumed the value without keeping it (field names, skipped fields).
    Discarded(Value),
}

pub(crate) enum Ending {
    /// The end event closed a section of the container, not the container.
    Continue,
    Finished(Value),
}

pub(crate) struct Frame {
    pub(crate) id: FrameId,
    pub(crate) target: TypeDescriptor,
    pub(crate) value: Value,
    pub(crate) state: FrameState,
    pub(crate) finishers: SmallVec<[Finisher; 2]>,
    /// Parts of `value` the last `accept` overwrote or removed, with their former paths.
    pub(crate) displaced: Vec<(SlotPath, Value)>,
}

/// Two entries of one map whose keys turned out equal after a key was patched in.
#[derive(Debug)]
pub(crate) struct KeyMerge {
    /// Position that survives; it now holds the later entry's value.
    pub(crate) kept: usize,
    /// Position that was deleted.
    pub(crate) removed: usize,
    /// Value the kept entry held before, when it was replaced.
    pub(crate) replaced: Option<Value>,
    pub(crate) removed_key: Value,
}

fn malformed(target: &TypeDescriptor) -> Error {
    Error::structure(format!("container for {target} lost its value"))
}

/// Append a key, or fill the value of the pending key.
///
/// A repeated key keeps its first position and takes the new value; the repeated key entry is
/// dropped. Whatever is overwritten or dropped goes to `displaced`.
fn accept_entry(
    entries: &mut Vec<(Value, Value)>,
    pending_key: &mut Option<usize>,
    value: Value,
    displaced: &mut Vec<(SlotPath, Value)>,
) -> Result<Accepted> {
    let Some(index) = pending_key.take() else {
        entries.push((value, Value::Null));
        let index = entries.len() - 1;
        *pending_key = Some(index);
        return Ok(Accepted::Stored(smallvec![Slot::EntryKey(index)]));
    };
    if index >= entries.len() {
        return Err(Error::structure("map entry lost its key"));
    }
    let key = &entries[index].0;
    let earlier = if key.is_null() {
        None
    } else {
        entries[..index].iter().position(|(k, _)| k == key)
    };
    let slot = match earlier {
        Some(first) => {
            let (key, _) = entries.remove(index);
            displaced.push((smallvec![Slot::EntryKey(index)], key));
            first
        }
        None => index,
    };
    let old = std::mem::replace(&mut entries[slot].1, value);
    displaced.push((smallvec![Slot::EntryValue(slot)], old));
    Ok(Accepted::Stored(smallvec![Slot::EntryValue(slot)]))
}

fn key_segment(entries: &[(Value, Value)], index: usize) -> Option<PathSegment> {
    let key = &entries.get(index)?.0;
    let name = match key {
        Value::String(s) => s.clone(),
        Value::Int(v) => v.to_string(),
        Value::Uint(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        other => other.kind_name().to_owned(),
    };
    Some(PathSegment {
        kind: PathKind::Key,
        name,
    })
}

impl Frame {
    /// True when the next child is a record field name.
    pub(crate) fn awaits_field_name(&self) -> bool {
        matches!(
            self.state,
            FrameState::Record {
                expect: FieldExpect::Name,
                ..
            }
        )
    }

    /// The builder for the next child value.
    pub(crate) fn next_builder(&self) -> Result<Builder> {
        match &self.state {
            FrameState::Root { builder, filled } => {
                if *filled {
                    Err(Error::structure("the document already has its top-level value"))
                } else {
                    Ok(builder.clone())
                }
            }
            FrameState::List { element } => Ok(element.clone()),
            FrameState::Array { element, next, len } => {
                if next >= len {
                    Err(Error::ArrayLength {
                        target: self.target.to_string(),
                        len: *len,
                    })
                } else {
                    Ok(element.clone())
                }
            }
            FrameState::Map {
                key,
                value,
                pending_key,
            } => Ok(if pending_key.is_some() { value } else { key }.clone()),
            FrameState::Record { expect, .. } => Ok(match expect {
                FieldExpect::Name => Builder::field_name(),
                FieldExpect::Field { builder, .. } => builder.clone(),
                FieldExpect::Skip { .. } => Builder::ignore(),
            }),
            FrameState::Edge { filled } if *filled >= 3 => Err(Error::structure(
                "an edge holds exactly a source, a description and a destination",
            )),
            FrameState::Markup { .. } | FrameState::Edge { .. } | FrameState::Node { .. } => {
                Ok(Builder::any())
            }
        }
    }

    /// Take a finished child value.
    pub(crate) fn accept(&mut self, env: &BuildEnv, value: Value) -> Result<Accepted> {
        match &mut self.state {
            FrameState::Root { filled, .. } => {
                self.value = value;
                *filled = true;
                Ok(Accepted::Stored(SlotPath::new()))
            }
            FrameState::List { .. } => {
                let Value::List(items) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                items.push(value);
                Ok(Accepted::Stored(smallvec![Slot::Index(items.len() - 1)]))
            }
            FrameState::Array { next, .. } => {
                let Value::List(items) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                let index = *next;
                match items.get_mut(index) {
                    Some(slot) => *slot = value,
                    None => items.push(value),
                }
                *next += 1;
                Ok(Accepted::Stored(smallvec![Slot::Index(index)]))
            }
            FrameState::Map { pending_key, .. } => {
                let Value::Map(map) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                accept_entry(map.entries_mut(), pending_key, value, &mut self.displaced)
            }
            FrameState::Record { table, expect } => {
                match std::mem::replace(expect, FieldExpect::Name) {
                    FieldExpect::Name => {
                        let Value::String(name) = &value else {
                            return Err(Error::structure(format!(
                                "record field names must be strings, got {}",
                                value.kind_name()
                            )));
                        };
                        let case_insensitive = env.options.case_insensitive_struct_field_names;
                        *expect = match table.lookup(name, case_insensitive) {
                            Some(entry) => FieldExpect::Field {
                                name: name.clone(),
                                path: entry.path.clone(),
                                builder: env.builder_for(&entry.ty),
                            },
                            None if env.options.reject_unknown_fields => {
                                return Err(Error::UnknownField {
                                    field: name.clone(),
                                    target: self.target.to_string(),
                                });
                            }
                            None => {
                                trace!(field = %name, record = %self.target, "skipping unknown field");
                                FieldExpect::Skip { name: name.clone() }
                            }
                        };
                        Ok(Accepted::Discarded(value))
                    }
                    FieldExpect::Field { path, .. } => {
                        let slots: SlotPath = path.iter().map(|i| Slot::Field(*i)).collect();
                        let slot = self
                            .value
                            .at_path_mut(&slots)
                            .ok_or_else(|| malformed(&self.target))?;
                        *slot = value;
                        Ok(Accepted::Stored(slots))
                    }
                    FieldExpect::Skip { .. } => Ok(Accepted::Discarded(value)),
                }
            }
            FrameState::Markup {
                in_contents,
                pending_key,
            } => {
                let Value::Markup(markup) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                if *in_contents {
                    markup.contents.push(value);
                    Ok(Accepted::Stored(smallvec![Slot::Index(
                        markup.contents.len() - 1
                    )]))
                } else {
                    accept_entry(
                        markup.attributes.entries_mut(),
                        pending_key,
                        value,
                        &mut self.displaced,
                    )
                }
            }
            FrameState::Edge { filled } => {
                let Value::Edge(edge) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                let component = *filled;
                match component {
                    0 => edge.source = value,
                    1 => edge.description = value,
                    2 => edge.destination = value,
                    _ => {
                        return Err(Error::structure(
                            "an edge holds exactly a source, a description and a destination",
                        ));
                    }
                }
                *filled += 1;
                Ok(Accepted::Stored(smallvec![Slot::Field(component)]))
            }
            FrameState::Node { has_value } => {
                let Value::Node(node) = &mut self.value else {
                    return Err(malformed(&self.target));
                };
                if *has_value {
                    node.children.push(value);
                    Ok(Accepted::Stored(smallvec![Slot::Index(
                        node.children.len() - 1
                    )]))
                } else {
                    node.value = Box::new(value);
                    *has_value = true;
                    Ok(Accepted::Stored(smallvec![Slot::Field(0)]))
                }
            }
        }
    }

    /// The key at `index` of the map at `map_path` was just patched in. If it now equals
    /// another key of that map, merge the two entries: the earlier position survives with the
    /// later value.
    ///
    /// A key whose value is still to come is left alone; `accept` merges it when the value
    /// arrives.
    pub(crate) fn merge_duplicate_key(&mut self, map_path: &[Slot], index: usize) -> Option<KeyMerge> {
        let pending_key = match (&mut self.state, map_path.is_empty()) {
            (FrameState::Map { pending_key, .. } | FrameState::Markup { pending_key, .. }, true) => {
                Some(pending_key)
            }
            _ => None,
        };
        let pending = pending_key.as_ref().and_then(|p| **p);
        if pending == Some(index) {
            return None;
        }
        let entries = match self.value.at_path_mut(map_path)? {
            Value::Map(map) => map.entries_mut(),
            Value::Markup(markup) => markup.attributes.entries_mut(),
            _ => return None,
        };
        let key = &entries.get(index)?.0;
        if key.is_null() {
            return None;
        }
        let other = entries
            .iter()
            .enumerate()
            .position(|(i, (k, _))| i != index && k == key)?;
        let (kept, removed) = (index.min(other), index.max(other));

        // A pending later key has no value yet; its value will land on the kept position.
        let replaced = if pending == Some(removed) {
            None
        } else {
            let later = std::mem::take(&mut entries[removed].1);
            Some(std::mem::replace(&mut entries[kept].1, later))
        };
        let (removed_key, _) = entries.remove(removed);
        if let Some(pending_key) = pending_key {
            *pending_key = match *pending_key {
                Some(i) if i == removed => Some(kept),
                Some(i) if i > removed => Some(i - 1),
                other => other,
            };
        }
        Some(KeyMerge {
            kept,
            removed,
            replaced,
            removed_key,
        })
    }

    /// Handle the end-of-container event.
    pub(crate) fn end(&mut self) -> Result<Ending> {
        match &mut self.state {
            FrameState::Root { .. } => Err(Error::structure(
                "end of container with no container open",
            )),
            FrameState::List { .. } | FrameState::Array { .. } => {
                Ok(Ending::Finished(std::mem::take(&mut self.value)))
            }
            FrameState::Map { pending_key, .. } => {
                if pending_key.is_some() {
                    return Err(Error::structure("map ended between a key and its value"));
                }
                Ok(Ending::Finished(std::mem::take(&mut self.value)))
            }
            FrameState::Record { expect, .. } => {
                if !matches!(expect, FieldExpect::Name) {
                    return Err(Error::structure(
                        "record ended between a field name and its value",
                    ));
                }
                Ok(Ending::Finished(std::mem::take(&mut self.value)))
            }
            FrameState::Markup {
                in_contents,
                pending_key,
            } => {
                if *in_contents {
                    return Ok(Ending::Finished(std::mem::take(&mut self.value)));
                }
                if pending_key.is_some() {
                    return Err(Error::structure(
                        "markup attributes ended between a key and its value",
                    ));
                }
                *in_contents = true;
                Ok(Ending::Continue)
            }
            FrameState::Edge { filled } => {
                if *filled != 3 {
                    return Err(Error::structure(format!(
                        "an edge needs a source, a description and a destination, got {filled} component(s)"
                    )));
                }
                Ok(Ending::Finished(std::mem::take(&mut self.value)))
            }
            FrameState::Node { has_value } => {
                if !*has_value {
                    return Err(Error::structure("a node ended before its value"));
                }
                Ok(Ending::Finished(std::mem::take(&mut self.value)))
            }
        }
    }

    /// Where the next child will go, for error paths.
    pub(crate) fn path_segment(&self) -> Option<PathSegment> {
        match (&self.state, &self.value) {
            (FrameState::List { .. }, Value::List(items)) => Some(items.len().into()),
            (FrameState::Array { next, .. }, _) => Some((*next).into()),
            (
                FrameState::Map {
                    pending_key: Some(index),
                    ..
                },
                Value::Map(map),
            ) => key_segment(map.entries(), *index),
            (FrameState::Record { expect, .. }, _) => match expect {
                FieldExpect::Field { name, .. } | FieldExpect::Skip { name } => {
                    Some(name.as_str().into())
                }
                FieldExpect::Name => None,
            },
            (
                FrameState::Markup {
                    in_contents: false,
                    pending_key: Some(index),
                },
                Value::Markup(markup),
            ) => key_segment(markup.attributes.entries(), *index),
            (
                FrameState::Markup {
                    in_contents: true, ..
                },
                Value::Markup(markup),
            ) => Some(markup.contents.len().into()),
            (FrameState::Edge { filled }, _) => Some((*filled).into()),
            (FrameState::Node { has_value: true }, Value::Node(node)) => {
                Some(node.children.len().into())
            }
            _ => None,
        }
    }
}

/// Frames from the root (index 0) to the innermost open container.
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
    next_id: u64,
}

impl FrameStack {
    pub(crate) fn new(root: Builder) -> Self {
        let target = root.target().clone();
        Self {
            frames: vec![Frame {
                id: FrameId(0),
                target,
                value: Value::Null,
                state: FrameState::Root {
                    builder: root,
                    filled: false,
                },
                finishers: SmallVec::new(),
                displaced: Vec::new(),
            }],
            next_id: 1,
        }
    }

    pub(crate) fn push(&mut self, target: TypeDescriptor, value: Value, state: FrameState) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        trace!(frame = id.0, target = %target, depth = self.frames.len(), "open container");
        self.frames.push(Frame {
            id,
            target,
            value,
            state,
            finishers: SmallVec::new(),
            displaced: Vec::new(),
        });
        id
    }

    /// Remove the innermost container frame. The root frame is never popped.
    pub(crate) fn pop(&mut self) -> Result<Frame> {
        if self.frames.len() <= 1 {
            return Err(Error::structure("end of container with no container open"));
        }
        self.frames
            .pop()
            .ok_or_else(|| Error::structure("build stack is empty"))
    }

    pub(crate) fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::structure("build stack is empty"))
    }

    pub(crate) fn top_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::structure("build stack is empty"))
    }

    /// Number of open containers.
    pub(crate) fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub(crate) fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn find(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().rev().find(|f| f.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.iter_mut().rev().find(|f| f.id == id)
    }

    /// The root frame's value, once all containers are closed.
    pub(crate) fn root_value(&self) -> Option<&Value> {
        match self.frames.as_slice() {
            [root] => match root.state {
                FrameState::Root { filled: true, .. } => Some(&root.value),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn into_root_value(mut self) -> Option<Value> {
        if self.root_value().is_none() {
            return None;
        }
        self.frames.pop().map(|root| root.value)
    }
}
