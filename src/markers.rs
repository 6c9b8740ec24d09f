//! Marker bookkeeping for one build.
//!
//! A marker names the value that follows it; a reference stands for a copy of a marked value.
//! References may come before their marker (forward references), so a reference to an unknown
//! id leaves a placeholder in its slot and registers a [`Patch`]: "when `id` is marked, build a
//! copy into this slot". Values never alias: every resolved reference holds its own copy.
//!
//! Locations are expressed relative to the container frame that currently owns the slot. When a
//! container finishes and is stored into its parent, every location inside it is rebased onto
//! the parent; when a container is discarded (the value of an unknown record field, or a map
//! value replaced by a repeated key), locations inside it are dropped and marked values inside
//! it are kept as detached copies.

use ahash::{AHashMap, AHashSet};

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::path::{join, Slot, SlotPath};
use crate::tracing_macros::trace;
use crate::value::Value;

/// Identity of a container frame on the build stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FrameId(pub(crate) u64);

/// A slot inside the value of a frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Location {
    pub(crate) frame: FrameId,
    pub(crate) path: SlotPath,
}

impl Location {
    pub(crate) fn new(frame: FrameId, path: SlotPath) -> Self {
        Self { frame, path }
    }

    /// The rest of `other`'s path if it lies within `self`.
    fn suffix_of<'a>(&self, other: &'a Location) -> Option<&'a [Slot]> {
        if other.frame == self.frame && other.path.starts_with(&self.path) {
            Some(&other.path[self.path.len()..])
        } else {
            None
        }
    }
}

/// Where a marked value can be read from.
#[derive(Clone, Debug)]
pub(crate) enum Binding {
    Located(Location),
    /// The value was discarded by its parent; a copy is kept here.
    Detached(Value),
}

/// A pending reference: build a copy of the marked value into `location` using `builder`.
#[derive(Clone)]
pub(crate) struct Patch {
    /// `None` when the slot was discarded; the patch then only keeps the id pending.
    pub(crate) location: Option<Location>,
    pub(crate) builder: Builder,
}

/// How a copied value was reshaped on its way into a slot (optional wrappers added or removed),
/// so that holes inside it can be re-addressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Reshape {
    /// Positive: optional layers added around the value. Negative: layers removed.
    pub(crate) optional_layers: i32,
}

impl Reshape {
    pub(crate) fn wrapped(self) -> Self {
        Self {
            optional_layers: self.optional_layers + 1,
        }
    }

    pub(crate) fn unwrapped(self) -> Self {
        Self {
            optional_layers: self.optional_layers - 1,
        }
    }

    fn apply(self, suffix: &[Slot]) -> Option<SlotPath> {
        if self.optional_layers >= 0 {
            let mut path: SlotPath = std::iter::repeat_n(Slot::Inner, self.optional_layers as usize).collect();
            path.extend_from_slice(suffix);
            return Some(path);
        }
        let strip = self.optional_layers.unsigned_abs() as usize;
        if suffix.len() < strip || suffix[..strip].iter().any(|s| *s != Slot::Inner) {
            return None;
        }
        Some(SlotPath::from_slice(&suffix[strip..]))
    }
}

/// Identity of a pending reference, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct PatchId(u64);

struct Pending {
    id: String,
    patch: Patch,
}

/// Something whose location lives in a frame: a located marker or a located patch.
#[derive(Clone, Debug)]
enum Tracked {
    Marker(String),
    Patch(PatchId),
}

/// Outcome for one location visited by [`MarkerRegistry::update`].
enum Fate {
    Keep,
    /// The slot is gone. Markers keep the given copy; patches stay pending without a slot.
    Detach(Option<Value>),
}

/// Tracked locations of one frame, bucketed by the first slot of their path.
type Buckets = AHashMap<Option<Slot>, Vec<Tracked>>;

/// Marker table of one build: resolved markers, markers of containers still being built, and
/// pending references.
///
/// Located markers and patches are indexed by frame, so closing a container only visits the
/// locations inside it.
#[derive(Default)]
pub struct MarkerRegistry {
    bound: AHashMap<String, Binding>,
    open: AHashSet<String>,
    pending: AHashMap<String, Vec<PatchId>>,
    patches: AHashMap<PatchId, Pending>,
    next_patch: u64,
    located: AHashMap<FrameId, Buckets>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the value named `id` is complete.
    pub fn is_bound(&self, id: &str) -> bool {
        self.bound.contains_key(id)
    }

    /// True while the container named `id` is still being built.
    pub fn is_open(&self, id: &str) -> bool {
        self.open.contains(id)
    }

    /// Number of references still waiting for their marker.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Ids referenced but never marked, sorted.
    pub fn unresolved_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn ensure_unused(&self, id: &str) -> Result<()> {
        if self.is_bound(id) || self.is_open(id) {
            return Err(Error::DuplicateMarker { id: id.to_owned() });
        }
        Ok(())
    }

    fn track(&mut self, location: &Location, tracked: Tracked) {
        self.located
            .entry(location.frame)
            .or_default()
            .entry(location.path.first().copied())
            .or_default()
            .push(tracked);
    }

    /// A marked container started.
    pub(crate) fn open(&mut self, id: &str) -> Result<()> {
        self.ensure_unused(id)?;
        self.open.insert(id.to_owned());
        Ok(())
    }

    /// A marked container finished; it is bound right after by [`mark`](Self::mark).
    pub(crate) fn close(&mut self, id: &str) {
        self.open.remove(id);
    }

    /// Bind `id` and hand back the references that were waiting for it, in arrival order.
    pub(crate) fn mark(&mut self, id: &str, binding: Binding) -> Result<Vec<Patch>> {
        self.ensure_unused(id)?;
        trace!(marker = id, "marker bound");
        if let Binding::Located(location) = &binding {
            self.track(location, Tracked::Marker(id.to_owned()));
        }
        self.bound.insert(id.to_owned(), binding);
        let waiting = self.pending.remove(id).unwrap_or_default();
        Ok(waiting
            .into_iter()
            .filter_map(|patch_id| self.patches.remove(&patch_id))
            .map(|pending| pending.patch)
            .collect())
    }

    pub(crate) fn binding(&self, id: &str) -> Option<&Binding> {
        self.bound.get(id)
    }

    /// Register a reference to a marker that has not appeared yet.
    pub(crate) fn defer(&mut self, id: &str, patch: Patch) {
        trace!(marker = id, "reference deferred");
        let patch_id = PatchId(self.next_patch);
        self.next_patch += 1;
        if let Some(location) = &patch.location {
            self.track(location, Tracked::Patch(patch_id));
        }
        self.patches.insert(
            patch_id,
            Pending {
                id: id.to_owned(),
                patch,
            },
        );
        self.pending.entry(id.to_owned()).or_default().push(patch_id);
    }

    /// Visit the tracked locations of `frame` that may lie under `within` (all of them when
    /// `within` is empty) and re-index the ones that are kept.
    fn update(
        &mut self,
        frame: FrameId,
        within: &[Slot],
        mut fate: impl FnMut(&mut Location, bool) -> Fate,
    ) {
        let Some(buckets) = self.located.get_mut(&frame) else {
            return;
        };
        let visited: Vec<Tracked> = match within.first() {
            None => std::mem::take(buckets).into_values().flatten().collect(),
            Some(first) => buckets.remove(&Some(*first)).unwrap_or_default(),
        };
        for tracked in visited {
            let kept = match &tracked {
                Tracked::Marker(id) => {
                    let Some(binding) = self.bound.get_mut(id) else {
                        continue;
                    };
                    let Binding::Located(location) = binding else {
                        continue;
                    };
                    if location.frame != frame {
                        continue;
                    }
                    match fate(location, true) {
                        Fate::Keep => Some((location.frame, location.path.first().copied())),
                        Fate::Detach(copy) => {
                            *binding = Binding::Detached(copy.unwrap_or_default());
                            None
                        }
                    }
                }
                Tracked::Patch(patch_id) => {
                    let Some(pending) = self.patches.get_mut(patch_id) else {
                        continue;
                    };
                    let Some(location) = pending.patch.location.as_mut() else {
                        continue;
                    };
                    if location.frame != frame {
                        continue;
                    }
                    match fate(location, false) {
                        Fate::Keep => Some((location.frame, location.path.first().copied())),
                        Fate::Detach(_) => {
                            pending.patch.location = None;
                            None
                        }
                    }
                }
            };
            if let Some((frame, first)) = kept {
                self.located
                    .entry(frame)
                    .or_default()
                    .entry(first)
                    .or_default()
                    .push(tracked);
            }
        }
        if self.located.get(&frame).is_some_and(|buckets| buckets.is_empty()) {
            self.located.remove(&frame);
        }
    }

    /// A finished child frame was stored into `parent` at `prefix`.
    pub(crate) fn rebase(&mut self, child: FrameId, parent: FrameId, prefix: &[Slot]) {
        self.update(child, &[], |location, _| {
            location.frame = parent;
            location.path = join(prefix, &location.path);
            Fate::Keep
        });
    }

    /// A finished child frame was discarded. `value_at` reads from the discarded value.
    pub(crate) fn detach(&mut self, child: FrameId, value_at: impl Fn(&[Slot]) -> Option<Value>) {
        self.detach_within(child, &[], value_at);
    }

    /// The part of `frame`'s value at `prefix` was removed. `value_at` reads from the removed
    /// part, relative to `prefix`.
    pub(crate) fn detach_within(
        &mut self,
        frame: FrameId,
        prefix: &[Slot],
        value_at: impl Fn(&[Slot]) -> Option<Value>,
    ) {
        self.update(frame, prefix, |location, is_marker| {
            match location.path.strip_prefix(prefix) {
                Some(rest) => Fate::Detach(if is_marker { value_at(rest) } else { None }),
                None => Fate::Keep,
            }
        });
    }

    /// The part of `frame`'s value at `from` moved to `to`.
    pub(crate) fn relocate(&mut self, frame: FrameId, from: &[Slot], to: &[Slot]) {
        self.update(frame, from, |location, _| {
            if let Some(rest) = location.path.strip_prefix(from) {
                location.path = join(to, rest);
            }
            Fate::Keep
        });
    }

    /// Entry `removed` of the map at `map` inside `frame` was deleted and later entries moved
    /// up by one.
    pub(crate) fn close_entry_gap(&mut self, frame: FrameId, map: &[Slot], removed: usize) {
        let depth = map.len();
        self.update(frame, map, |location, _| {
            if location.path.starts_with(map) {
                if let Some(Slot::EntryKey(i) | Slot::EntryValue(i)) = location.path.get_mut(depth) {
                    if *i > removed {
                        *i -= 1;
                    }
                }
            }
            Fate::Keep
        });
    }

    /// A copy of the value marked `id` was written to `target`. Pending references inside the
    /// original are duplicated so the copy's placeholders get filled too.
    pub(crate) fn copy_holes(&mut self, id: &str, target: &Location, reshape: Reshape) {
        let Some(Binding::Located(source)) = self.bound.get(id) else {
            return;
        };
        let Some(buckets) = self.located.get(&source.frame) else {
            return;
        };
        let candidates: Vec<&Tracked> = match source.path.first() {
            None => buckets.values().flatten().collect(),
            Some(first) => buckets.get(&Some(*first)).into_iter().flatten().collect(),
        };
        let mut copies = Vec::new();
        for tracked in candidates {
            let Tracked::Patch(patch_id) = tracked else {
                continue;
            };
            let Some(pending) = self.patches.get(patch_id) else {
                continue;
            };
            let Some(suffix) = pending
                .patch
                .location
                .as_ref()
                .and_then(|l| source.suffix_of(l))
            else {
                continue;
            };
            if let Some(path) = reshape.apply(suffix) {
                copies.push((
                    *patch_id,
                    pending.id.clone(),
                    Patch {
                        location: Some(Location::new(target.frame, join(&target.path, &path))),
                        builder: pending.patch.builder.clone(),
                    },
                ));
            }
        }
        copies.sort_by_key(|(patch_id, _, _)| *patch_id);
        for (_, pending_id, patch) in copies {
            self.defer(&pending_id, patch);
        }
    }

    #[cfg(test)]
    fn pending_locations(&self, id: &str) -> Vec<Option<Location>> {
        self.pending
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|patch_id| self.patches.get(patch_id))
            .map(|pending| pending.patch.location.clone())
            .collect()
    }
}
