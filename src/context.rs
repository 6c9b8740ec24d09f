//! The per-build context: routes each data event to the builder on top of the stack.
//!
//! Scalar events ask the top frame for the builder of its next child, build the value and hand
//! it back to the frame. Container events push a frame; `on_end` pops it and delivers the
//! finished container to the new top ("unstack and notify parent"). Markers and references are
//! resolved here against the [`MarkerRegistry`], and chunked arrays are reassembled so that
//! builders only ever see complete payloads.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use uuid::Uuid;

use crate::array::check_payload_length;
use crate::big_float::BigFloat;
use crate::budget::{BudgetEnforcer, BudgetReport};
use crate::builder::{Accepted, BuildEnv, Builder, Ending, Finisher, FrameStack};
use crate::decimal_float::DecimalFloat;
use crate::error::{Error, Result};
use crate::events::{ArrayKind, DataEventReceiver};
use crate::markers::{Binding, FrameId, Location, MarkerRegistry, Patch};
use crate::path::{join, BuildPath, Slot};
use crate::tracing_macros::{debug, trace};
use crate::value::{Time, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Building,
    Finished,
    Failed,
}

/// An array arriving in chunks.
struct ChunkedArray {
    kind: ArrayKind,
    element_count: u64,
    data: Vec<u8>,
    /// Bytes still expected for the current chunk.
    chunk_remaining: u64,
    more_chunks_follow: bool,
}

/// State of one build: the frame stack, markers, and any array being reassembled.
///
/// Obtained from [`Session::new_build`](crate::Session::new_build). Feed it events through
/// [`DataEventReceiver`], then take the result with [`into_built_object`].
/// After the first error every further event fails; a build is never resumed.
///
/// [`into_built_object`]: BuildContext::into_built_object
pub struct BuildContext {
    env: BuildEnv,
    stack: FrameStack,
    markers: MarkerRegistry,
    pending_marker: Option<String>,
    chunk: Option<ChunkedArray>,
    enforcer: Option<BudgetEnforcer>,
    document_begun: bool,
    phase: Phase,
}

impl BuildContext {
    pub(crate) fn new(env: BuildEnv, root: Builder) -> Self {
        let enforcer = env.options.budget.clone().map(BudgetEnforcer::new);
        Self {
            env,
            stack: FrameStack::new(root),
            markers: MarkerRegistry::new(),
            pending_marker: None,
            chunk: None,
            enforcer,
            document_begun: false,
            phase: Phase::Building,
        }
    }

    /// Marker table of this build.
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    /// Counters of the budget enforcer, if a budget is configured.
    pub fn budget_report(&self) -> Option<&BudgetReport> {
        self.enforcer.as_ref().map(BudgetEnforcer::report)
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Check that the document is complete. Called by `on_end_document`; safe to call twice.
    pub fn finish(&mut self) -> Result<()> {
        match self.phase {
            Phase::Finished => Ok(()),
            Phase::Failed => Err(Error::structure("build already failed")),
            Phase::Building => {
                let result = self.check_complete();
                self.phase = if result.is_ok() {
                    Phase::Finished
                } else {
                    Phase::Failed
                };
                result
            }
        }
    }

    fn check_complete(&self) -> Result<()> {
        if self.chunk.is_some() {
            return Err(Error::structure("document ended inside a chunked array"));
        }
        if let Some(id) = &self.pending_marker {
            return Err(Error::structure(format!(
                "document ended after marker `{id}` with no value"
            )));
        }
        let depth = self.stack.depth();
        if depth > 0 {
            return Err(Error::structure(format!(
                "document ended with {depth} container(s) still open"
            )));
        }
        let ids = self.markers.unresolved_ids();
        if !ids.is_empty() {
            return Err(Error::UnresolvedReferences { ids });
        }
        if self.stack.root_value().is_none() {
            return Err(Error::structure("document ended without a value"));
        }
        Ok(())
    }

    /// The built value. Finishes the build first if the document end was not signalled.
    pub fn get_built_object(&mut self) -> Result<Value> {
        self.finish()?;
        self.stack
            .root_value()
            .cloned()
            .ok_or_else(|| Error::structure("document ended without a value"))
    }

    /// Consume the context and return the built value.
    pub fn into_built_object(mut self) -> Result<Value> {
        self.finish()?;
        self.stack
            .into_root_value()
            .ok_or_else(|| Error::structure("document ended without a value"))
    }

    /// Run one event: count it, apply it, and poison the build on failure.
    fn run(&mut self, apply: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        match self.phase {
            Phase::Building => {}
            Phase::Finished => return Err(Error::structure("event after the end of the document")),
            Phase::Failed => return Err(Error::structure("build already failed")),
        }
        let result = match self.enforcer.as_mut().map(BudgetEnforcer::observe_event) {
            Some(Err(breach)) => Err(Error::from(breach)),
            _ => apply(self),
        };
        result.map_err(|err| {
            self.phase = Phase::Failed;
            if matches!(err, Error::Budget { .. }) {
                debug!(error = %err, "build budget breached");
            }
            err.with_path(self.current_path())
        })
    }

    fn current_path(&self) -> BuildPath {
        let mut path = BuildPath::root();
        for segment in self.stack.frames().iter().filter_map(|f| f.path_segment()) {
            path.push(segment);
        }
        path
    }

    fn ensure_no_chunk(&self) -> Result<()> {
        if self.chunk.is_some() {
            return Err(Error::structure(
                "only array chunks and data may follow an array begin",
            ));
        }
        Ok(())
    }

    fn next_builder(&self) -> Result<Builder> {
        self.ensure_no_chunk()?;
        self.stack.top()?.next_builder()
    }

    /// Build a scalar with the next child's builder and store it.
    fn scalar(&mut self, build: impl FnOnce(&Builder, &BuildEnv) -> Result<Value>) -> Result<()> {
        let builder = self.next_builder()?;
        let value = build(&builder, &self.env)?;
        let marker = self.pending_marker.take();
        self.deliver(value, None, marker)
    }

    /// Hand a finished value to the top frame, then fix up markers that point into it.
    ///
    /// `child` is the frame the value was built in when it is a container.
    fn deliver(&mut self, value: Value, child: Option<FrameId>, marker: Option<String>) -> Result<()> {
        let (parent, accepted) = self.accept(value)?;
        if let Some(child) = child {
            match &accepted {
                Accepted::Stored(path) => self.markers.rebase(child, parent, path),
                Accepted::Discarded(value) => {
                    self.markers.detach(child, |path| value.at_path(path).cloned())
                }
            }
        }
        if let Some(id) = marker {
            let binding = match accepted {
                Accepted::Stored(path) => Binding::Located(Location::new(parent, path)),
                Accepted::Discarded(value) => Binding::Detached(value),
            };
            self.bind_marker(&id, binding)?;
        }
        Ok(())
    }

    /// Hand `value` to the top frame. Marker locations inside anything it overwrote are
    /// detached.
    fn accept(&mut self, value: Value) -> Result<(FrameId, Accepted)> {
        let frame = self.stack.top_mut()?;
        let accepted = frame.accept(&self.env, value)?;
        for (prefix, removed) in frame.displaced.drain(..) {
            self.markers
                .detach_within(frame.id, &prefix, |path| removed.at_path(path).cloned());
        }
        Ok((frame.id, accepted))
    }

    fn bind_marker(&mut self, id: &str, binding: Binding) -> Result<()> {
        for patch in self.markers.mark(id, binding)? {
            self.apply_patch(id, patch)?;
        }
        Ok(())
    }

    fn marked_value(&self, id: &str) -> Result<Value> {
        let value = match self.markers.binding(id) {
            Some(Binding::Detached(value)) => Some(value.clone()),
            Some(Binding::Located(location)) => self
                .stack
                .find(location.frame)
                .and_then(|frame| frame.value.at_path(&location.path))
                .cloned(),
            None => None,
        };
        value.ok_or_else(|| Error::structure(format!("value marked `{id}` is no longer available")))
    }

    /// Fill the slot a forward reference left behind.
    fn apply_patch(&mut self, id: &str, patch: Patch) -> Result<()> {
        let Some(location) = patch.location else {
            return Ok(());
        };
        let source = self.marked_value(id)?;
        let (value, reshape) = patch.builder.build_from_reference(&self.env, id, source)?;
        let slot = self
            .stack
            .find_mut(location.frame)
            .and_then(|frame| frame.value.at_path_mut(&location.path))
            .ok_or_else(|| {
                Error::structure(format!("slot of a reference to `{id}` is no longer available"))
            })?;
        *slot = value;
        trace!(marker = id, "reference patched");
        self.markers.copy_holes(id, &location, reshape);
        self.merge_patched_key(&location);
        Ok(())
    }

    /// A map key filled in late may repeat another key of its map; fold the two entries into
    /// one the way a repeated key is folded on arrival.
    fn merge_patched_key(&mut self, location: &Location) {
        let Some((Slot::EntryKey(index), map)) = location.path.split_last() else {
            return;
        };
        let Some(merge) = self
            .stack
            .find_mut(location.frame)
            .and_then(|frame| frame.merge_duplicate_key(map, *index))
        else {
            return;
        };
        let frame = location.frame;
        let entry = |slot: Slot| join(map, &[slot]);
        if let Some(replaced) = &merge.replaced {
            self.markers
                .detach_within(frame, &entry(Slot::EntryValue(merge.kept)), |path| {
                    replaced.at_path(path).cloned()
                });
            self.markers.relocate(
                frame,
                &entry(Slot::EntryValue(merge.removed)),
                &entry(Slot::EntryValue(merge.kept)),
            );
        }
        self.markers
            .detach_within(frame, &entry(Slot::EntryKey(merge.removed)), |path| {
                merge.removed_key.at_path(path).cloned()
            });
        self.markers.close_entry_gap(frame, map, merge.removed);
    }

    fn reference(&mut self, id: &str) -> Result<()> {
        if self.pending_marker.is_some() {
            return Err(Error::structure("a marker cannot precede a reference"));
        }
        if let Some(enforcer) = self.enforcer.as_mut() {
            enforcer.observe_reference()?;
        }
        let builder = self.next_builder()?;

        if self.markers.is_open(id) {
            return self.deliver(Value::Recursive(id.to_owned()), None, None);
        }

        if self.markers.is_bound(id) {
            let source = self.marked_value(id)?;
            let (value, reshape) = builder.build_from_reference(&self.env, id, source)?;
            if let (frame_id, Accepted::Stored(path)) = self.accept(value)? {
                self.markers
                    .copy_holes(id, &Location::new(frame_id, path), reshape);
            }
            return Ok(());
        }

        if self.stack.top()?.awaits_field_name() {
            return Err(Error::structure(format!(
                "record field name refers to marker `{id}`, which is not defined yet"
            )));
        }
        let location = match self.accept(builder.placeholder())? {
            (frame_id, Accepted::Stored(path)) => Some(Location::new(frame_id, path)),
            (_, Accepted::Discarded(_)) => None,
        };
        self.markers.defer(id, Patch { location, builder });
        Ok(())
    }

    fn marker(&mut self, id: &str) -> Result<()> {
        self.ensure_no_chunk()?;
        if let Some(previous) = &self.pending_marker {
            return Err(Error::structure(format!(
                "marker `{id}` follows marker `{previous}` with no value in between"
            )));
        }
        if self.markers.is_bound(id) || self.markers.is_open(id) {
            return Err(Error::DuplicateMarker { id: id.to_owned() });
        }
        if let Some(enforcer) = self.enforcer.as_mut() {
            enforcer.observe_marker()?;
        }
        self.pending_marker = Some(id.to_owned());
        Ok(())
    }

    /// Push the frame of a container started by the next child's builder.
    fn begin(
        &mut self,
        begin: impl FnOnce(&Builder, &BuildEnv, &mut FrameStack) -> Result<()>,
    ) -> Result<()> {
        let builder = self.next_builder()?;
        begin(&builder, &self.env, &mut self.stack)?;
        if let Some(enforcer) = self.enforcer.as_mut() {
            enforcer.observe_depth(self.stack.depth())?;
        }
        if let Some(id) = self.pending_marker.take() {
            self.markers.open(&id)?;
            self.stack.top_mut()?.finishers.push(Finisher::Mark(id));
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_no_chunk()?;
        if let Some(id) = &self.pending_marker {
            return Err(Error::structure(format!(
                "container ended after marker `{id}` with no value"
            )));
        }
        match self.stack.top_mut()?.end()? {
            Ending::Continue => Ok(()),
            Ending::Finished(value) => self.unstack_and_notify_parent(value),
        }
    }

    /// Pop the finished container frame and deliver its value to the parent frame.
    pub(crate) fn unstack_and_notify_parent(&mut self, value: Value) -> Result<()> {
        let frame = self.stack.pop()?;
        let child = frame.id;
        trace!(frame = child.0, target = %frame.target, "close container");
        let mut value = value;
        let mut marker = None;
        for finisher in frame.finishers {
            match finisher {
                Finisher::WrapOptional => {
                    value = Value::Optional(Some(Box::new(value)));
                    self.markers.rebase(child, child, &[Slot::Inner]);
                }
                Finisher::Mark(id) => {
                    self.markers.close(&id);
                    marker = Some(id);
                }
            }
        }
        self.deliver(value, Some(child), marker)
    }

    fn array(&mut self, kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<()> {
        let builder = self.next_builder()?;
        let value = if kind.is_stringlike() {
            check_payload_length(kind, element_count, data)?;
            let text = std::str::from_utf8(data).map_err(|e| {
                Error::array_payload(format!("{} is not valid UTF-8: {e}", kind.name()))
            })?;
            builder.build_from_stringlike_array(&self.env, kind, text.to_owned())?
        } else {
            builder.build_from_array(&self.env, kind, element_count, data)?
        };
        let marker = self.pending_marker.take();
        self.deliver(value, None, marker)
    }

    fn observe_array_bytes(&mut self, array_bytes: u64, added: u64) -> Result<()> {
        if let Some(enforcer) = self.enforcer.as_mut() {
            let array_bytes = usize::try_from(array_bytes).unwrap_or(usize::MAX);
            let added = usize::try_from(added).unwrap_or(usize::MAX);
            enforcer.observe_array_bytes(array_bytes, added)?;
        }
        Ok(())
    }

    fn array_begin(&mut self, kind: ArrayKind) -> Result<()> {
        self.ensure_no_chunk()?;
        self.chunk = Some(ChunkedArray {
            kind,
            element_count: 0,
            data: Vec::new(),
            chunk_remaining: 0,
            more_chunks_follow: true,
        });
        Ok(())
    }

    fn array_chunk(&mut self, element_count: u64, more_chunks_follow: bool) -> Result<()> {
        let chunk = self
            .chunk
            .as_mut()
            .ok_or_else(|| Error::structure("array chunk without an array begin"))?;
        if chunk.chunk_remaining > 0 {
            return Err(Error::structure(format!(
                "array chunk header while {} byte(s) of the previous chunk are missing",
                chunk.chunk_remaining
            )));
        }
        if chunk.kind == ArrayKind::Bit && more_chunks_follow && element_count % 8 != 0 {
            return Err(Error::array_payload(
                "a bit array chunk other than the last must hold a multiple of 8 bits",
            ));
        }
        let bytes = chunk.kind.byte_length(element_count).ok_or_else(|| {
            Error::array_payload(format!("{element_count} elements of {} overflow", chunk.kind.name()))
        })?;
        chunk.element_count = chunk
            .element_count
            .checked_add(element_count)
            .ok_or_else(|| Error::array_payload("chunked array element count overflows"))?;
        chunk.chunk_remaining = bytes;
        chunk.more_chunks_follow = more_chunks_follow;
        let total = chunk.data.len() as u64 + bytes;
        self.observe_array_bytes(total, bytes)?;
        if bytes == 0 && !more_chunks_follow {
            return self.complete_chunked_array();
        }
        Ok(())
    }

    fn array_data(&mut self, data: &[u8]) -> Result<()> {
        let chunk = self
            .chunk
            .as_mut()
            .ok_or_else(|| Error::structure("array data without an array begin"))?;
        let len = data.len() as u64;
        if len > chunk.chunk_remaining {
            return Err(Error::array_payload(format!(
                "{len} byte(s) of array data where the chunk expects {}",
                chunk.chunk_remaining
            )));
        }
        chunk.data.extend_from_slice(data);
        chunk.chunk_remaining -= len;
        if chunk.chunk_remaining == 0 && !chunk.more_chunks_follow {
            return self.complete_chunked_array();
        }
        Ok(())
    }

    fn complete_chunked_array(&mut self) -> Result<()> {
        let chunk = self
            .chunk
            .take()
            .ok_or_else(|| Error::structure("no chunked array in progress"))?;
        trace!(kind = chunk.kind.name(), elements = chunk.element_count, "chunked array complete");
        self.array(chunk.kind, chunk.element_count, &chunk.data)
    }
}

impl DataEventReceiver for BuildContext {
    fn on_begin_document(&mut self) -> Result<()> {
        self.run(|ctx| {
            if ctx.document_begun {
                return Err(Error::structure("document begins twice"));
            }
            ctx.document_begun = true;
            Ok(())
        })
    }

    fn on_end_document(&mut self) -> Result<()> {
        self.run(|_| Ok(()))?;
        self.finish()
    }

    fn on_null(&mut self) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_null(env)))
    }

    fn on_bool(&mut self, value: bool) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_bool(env, value)))
    }

    fn on_positive_int(&mut self, value: u64) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_uint(env, value)))
    }

    fn on_negative_int(&mut self, magnitude: u64) -> Result<()> {
        self.run(|ctx| {
            ctx.scalar(|b, env| match i64::try_from(-i128::from(magnitude)) {
                Ok(v) => b.build_from_int(env, v),
                Err(_) => b.build_from_big_int(env, -BigInt::from(magnitude)),
            })
        })
    }

    fn on_int(&mut self, value: i64) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_int(env, value)))
    }

    fn on_big_int(&mut self, value: BigInt) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_big_int(env, value)))
    }

    fn on_float(&mut self, value: f64) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_float(env, value)))
    }

    fn on_big_float(&mut self, value: BigFloat) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_big_float(env, value)))
    }

    fn on_decimal_float(&mut self, value: DecimalFloat) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_decimal_float(env, value)))
    }

    fn on_big_decimal_float(&mut self, value: BigDecimal) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_big_decimal_float(env, value)))
    }

    fn on_nan(&mut self, signaling: bool) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_nan(env, signaling)))
    }

    fn on_uid(&mut self, value: Uuid) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_uid(env, value)))
    }

    fn on_time(&mut self, value: Time) -> Result<()> {
        self.run(|ctx| ctx.scalar(|b, env| b.build_from_time(env, value)))
    }

    fn on_array(&mut self, kind: ArrayKind, element_count: u64, data: &[u8]) -> Result<()> {
        self.run(|ctx| {
            ctx.ensure_no_chunk()?;
            let len = data.len() as u64;
            ctx.observe_array_bytes(len, len)?;
            ctx.array(kind, element_count, data)
        })
    }

    fn on_array_begin(&mut self, kind: ArrayKind) -> Result<()> {
        self.run(|ctx| ctx.array_begin(kind))
    }

    fn on_array_chunk(&mut self, element_count: u64, more_chunks_follow: bool) -> Result<()> {
        self.run(|ctx| ctx.array_chunk(element_count, more_chunks_follow))
    }

    fn on_array_data(&mut self, data: &[u8]) -> Result<()> {
        self.run(|ctx| ctx.array_data(data))
    }

    fn on_list(&mut self) -> Result<()> {
        self.run(|ctx| ctx.begin(|b, env, stack| b.build_begin_list(env, stack)))
    }

    fn on_map(&mut self) -> Result<()> {
        self.run(|ctx| ctx.begin(|b, env, stack| b.build_begin_map(env, stack)))
    }

    fn on_markup(&mut self, name: &str) -> Result<()> {
        self.run(|ctx| ctx.begin(|b, env, stack| b.build_begin_markup(env, stack, name)))
    }

    fn on_edge(&mut self) -> Result<()> {
        self.run(|ctx| ctx.begin(|b, env, stack| b.build_begin_edge(env, stack)))
    }

    fn on_node(&mut self) -> Result<()> {
        self.run(|ctx| ctx.begin(|b, env, stack| b.build_begin_node(env, stack)))
    }

    fn on_end(&mut self) -> Result<()> {
        self.run(|ctx| ctx.end())
    }

    fn on_marker(&mut self, id: &str) -> Result<()> {
        self.run(|ctx| ctx.marker(id))
    }

    fn on_reference(&mut self, id: &str) -> Result<()> {
        self.run(|ctx| ctx.reference(id))
    }
}
