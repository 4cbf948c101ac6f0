// Stack-frame proxies and the frame-local value pipeline
//
// A frame is addressed by (thread, 1-based index from the bottom of the
// stack). The wire-level frame id is a materialization detail fetched on
// demand and dropped whenever the clock bumps or the VM reports it
// stale. Frame-scoped operations live as `ThreadProxy` methods because
// every one of them walks through the owning thread's frame list.

use crate::client::{DebuggerClient, ValueFetchPath};
use crate::clock::{CacheStamp, InvalidationClock};
use crate::error::{is_stale_frame, ProxyError, ProxyResult};
use crate::locals::{
    first_local_slot, parameter_descriptors, recover_descriptors, LocalVariableDescriptor,
    SlotNameTable,
};
use crate::thread::ThreadProxy;
use jdwp_transport::reftype::MethodInfo;
use jdwp_transport::stackframe::SlotRequest;
use jdwp_transport::types::{tags, FrameId, FrameInfo, Location, ThreadId, Value};
use jdwp_transport::{ErrorCode, JdwpError};
use tracing::{debug, warn};

/// When a frame id near the top of the stack must be materialized, this
/// many topmost frames are fetched in one request instead of one.
pub(crate) const FRAME_BATCH: usize = 20;

/// Stable address of one frame: the thread plus the 1-based position
/// counted from the bottom of the stack. Unlike a raw frame id, it stays
/// meaningful across frame-id rotation as long as the clock is
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    pub thread: ThreadId,
    pub index_from_bottom: u32,
}

/// How much work to spend recovering frame locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Declared parameters only; no instruction-stream scan.
    Fast,
    /// Parameters plus every local slot live at the current offset.
    Full,
}

/// One slot's outcome inside a batch fetch. A corrupted slot is marked
/// and skipped for the rest of the session instead of poisoning its
/// neighbours.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Value(Value),
    Corrupted(ErrorCode),
}

/// A recovered variable paired with its fetched value.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub descriptor: LocalVariableDescriptor,
    pub value: SlotValue,
}

#[derive(Debug)]
pub(crate) struct FrameProxy {
    stamp: CacheStamp,
    frame_id: Option<FrameId>,
    location: Option<Location>,
    this_object: Option<Value>,
    values: Option<(FetchMode, Vec<VariableValue>)>,
}

impl FrameProxy {
    pub(crate) fn with_info(info: FrameInfo, clock: &InvalidationClock) -> Self {
        Self {
            stamp: CacheStamp::new(clock),
            frame_id: Some(info.frame_id),
            location: Some(info.location),
            this_object: None,
            values: None,
        }
    }

    fn ensure_fresh(&mut self, clock: &InvalidationClock) {
        if self.stamp.refresh(clock) {
            self.clear();
        }
    }

    /// Drop everything keyed by the wire frame id. Called both on clock
    /// bump and when the VM answers INVALID_FRAMEID.
    fn clear(&mut self) {
        self.frame_id = None;
        self.location = None;
        self.this_object = None;
        self.values = None;
    }

    fn adopt_info(&mut self, info: FrameInfo) {
        self.frame_id = Some(info.frame_id);
        self.location = Some(info.location);
    }
}

/// One-shot retry tracker for INVALID_FRAMEID recovery. The states are
/// explicit rather than a loop counter so the fail path reads as a state
/// transition.
#[derive(Debug, PartialEq, Eq)]
enum RetryState {
    Pending,
    Retrying,
}

struct RetryOnce {
    state: RetryState,
}

impl RetryOnce {
    fn new() -> Self {
        Self {
            state: RetryState::Pending,
        }
    }

    /// First stale-frame error flips Pending to Retrying and allows one
    /// more attempt; a second one does not.
    fn should_retry(&mut self) -> bool {
        match self.state {
            RetryState::Pending => {
                self.state = RetryState::Retrying;
                true
            }
            RetryState::Retrying => false,
        }
    }
}

impl ThreadProxy {
    fn frame_slot(&mut self, index_from_bottom: u32) -> ProxyResult<&mut FrameProxy> {
        let count = self.frames_from_bottom.len() as u32;
        if index_from_bottom == 0 || index_from_bottom > count {
            return Err(ProxyError::FrameInvalidated);
        }
        Ok(&mut self.frames_from_bottom[index_from_bottom as usize - 1])
    }

    /// Materialize the wire frame id for one frame. When the target is
    /// within the top batch window, the whole window is fetched and
    /// sibling frames adopt their ids for free.
    pub(crate) async fn materialize_frame<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
    ) -> ProxyResult<(FrameId, Location)> {
        self.ensure_fresh(clock);
        // Resync the list length first: a from-bottom offset is only
        // meaningful against the live stack depth
        self.frames(client, clock).await?;

        let count = self.frames_from_bottom.len();
        {
            let frame = self.frame_slot(index_from_bottom)?;
            frame.ensure_fresh(clock);
            if let (Some(id), Some(location)) = (frame.frame_id, frame.location) {
                return Ok((id, location));
            }
        }

        let top_index = count - index_from_bottom as usize;
        if top_index < FRAME_BATCH {
            let window = FRAME_BATCH.min(count);
            let fetched = client
                .frames(self.id(), 0, window as i32)
                .await
                .map_err(ProxyError::from_command)?;
            for (i, info) in fetched.into_iter().enumerate() {
                let from_bottom = (count - i) as u32;
                if let Ok(frame) = self.frame_slot(from_bottom) {
                    frame.ensure_fresh(clock);
                    if frame.frame_id.is_none() {
                        frame.adopt_info(info);
                    }
                }
            }
        } else {
            let fetched = client
                .frames(self.id(), top_index as i32, 1)
                .await
                .map_err(ProxyError::from_command)?;
            let info = fetched
                .into_iter()
                .next()
                .ok_or(ProxyError::FrameInvalidated)?;
            let frame = self.frame_slot(index_from_bottom)?;
            frame.ensure_fresh(clock);
            frame.adopt_info(info);
        }

        let frame = self.frame_slot(index_from_bottom)?;
        match (frame.frame_id, frame.location) {
            (Some(id), Some(location)) => Ok((id, location)),
            _ => Err(ProxyError::FrameInvalidated),
        }
    }

    /// Location (class, method, bytecode offset) of one frame.
    pub async fn frame_location<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
    ) -> ProxyResult<Location> {
        let (_, location) = self.materialize_frame(client, clock, index_from_bottom).await?;
        Ok(location)
    }

    /// Recovery wrapper shared by every frame-id-keyed operation: on a
    /// stale-frame reply, clear the frame cache, verify the thread is
    /// still suspended, and retry exactly once with a rematerialized id.
    async fn recover_stale<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        index_from_bottom: u32,
        retry: &mut RetryOnce,
    ) -> ProxyResult<()> {
        debug!(
            thread = self.id(),
            frame = index_from_bottom,
            "frame id reported stale; clearing frame cache"
        );
        if let Ok(frame) = self.frame_slot(index_from_bottom) {
            frame.clear();
        }
        let (_, suspend) = client.thread_status(self.id()).await?;
        if !suspend.is_suspended() {
            // The thread ran: the frame is gone for a structural reason,
            // retrying with a fresh id would read a different stack
            return Err(ProxyError::ThreadNotSuspended(self.id()));
        }
        if !retry.should_retry() {
            warn!(
                thread = self.id(),
                frame = index_from_bottom,
                "frame id stale again after rematerialization"
            );
            return Err(ProxyError::FrameInvalidated);
        }
        Ok(())
    }

    /// The `this` reference of one frame; a null value for static and
    /// native frames.
    pub async fn frame_this_object<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
    ) -> ProxyResult<Value> {
        let mut retry = RetryOnce::new();
        loop {
            let (frame_id, _) = self.materialize_frame(client, clock, index_from_bottom).await?;
            if let Ok(frame) = self.frame_slot(index_from_bottom) {
                if let Some(this) = &frame.this_object {
                    return Ok(this.clone());
                }
            }
            match client.frame_this_object(self.id(), frame_id).await {
                Ok(value) => {
                    if let Ok(frame) = self.frame_slot(index_from_bottom) {
                        frame.this_object = Some(value.clone());
                    }
                    return Ok(value);
                }
                Err(e) if is_stale_frame(&e) => {
                    self.recover_stale(client, index_from_bottom, &mut retry).await?;
                }
                Err(e) => return Err(ProxyError::from_command(e)),
            }
        }
    }

    /// Recover and fetch the frame's local variables.
    ///
    /// `Fast` covers only the declared parameters. `Full` additionally
    /// walks the method's instruction stream up to the current offset
    /// when the VM can serve bytecodes; otherwise it degrades to the
    /// symbolic variable table, which covers only what the compiler
    /// chose to emit.
    pub async fn variable_values<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
        mode: FetchMode,
        fetch_path: ValueFetchPath,
    ) -> ProxyResult<Vec<VariableValue>> {
        self.variable_values_named(client, clock, index_from_bottom, mode, fetch_path, None)
            .await
    }

    /// Like `variable_values`, but with a caller-supplied name table
    /// (from a decompiler, a source map, anything) in place of the VM's
    /// symbolic one. Results for a supplied table are not cached on the
    /// frame: the table is the caller's state, not ours.
    pub async fn variable_values_named<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
        mode: FetchMode,
        fetch_path: ValueFetchPath,
        names: Option<&SlotNameTable>,
    ) -> ProxyResult<Vec<VariableValue>> {
        let mut retry = RetryOnce::new();
        loop {
            let (frame_id, location) =
                self.materialize_frame(client, clock, index_from_bottom).await?;
            if names.is_none() {
                if let Ok(frame) = self.frame_slot(index_from_bottom) {
                    if let Some((cached_mode, values)) = &frame.values {
                        if *cached_mode == mode {
                            return Ok(values.clone());
                        }
                    }
                }
            }

            let method = lookup_method(client, &location).await?;
            let descriptors =
                build_descriptors(client, &location, &method, mode, fetch_path, names).await?;

            match fetch_slot_batch(client, self.id(), frame_id, &descriptors).await {
                Ok(slot_values) => {
                    let values: Vec<VariableValue> = descriptors
                        .into_iter()
                        .zip(slot_values)
                        .map(|(descriptor, value)| VariableValue { descriptor, value })
                        .collect();
                    if names.is_none() {
                        if let Ok(frame) = self.frame_slot(index_from_bottom) {
                            frame.values = Some((mode, values.clone()));
                        }
                    }
                    return Ok(values);
                }
                Err(e) if is_stale_frame(&e) => {
                    self.recover_stale(client, index_from_bottom, &mut retry).await?;
                }
                Err(e) => return Err(ProxyError::from_command(e)),
            }
        }
    }

    /// Write one slot. The frame's cached values are dropped so the next
    /// read observes the store.
    pub async fn set_variable<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        index_from_bottom: u32,
        slot: u32,
        value: &Value,
    ) -> ProxyResult<()> {
        let mut retry = RetryOnce::new();
        loop {
            let (frame_id, _) = self.materialize_frame(client, clock, index_from_bottom).await?;
            match client
                .set_slot_value(self.id(), frame_id, slot as i32, value)
                .await
            {
                Ok(()) => {
                    if let Ok(frame) = self.frame_slot(index_from_bottom) {
                        frame.values = None;
                    }
                    return Ok(());
                }
                Err(e) if is_stale_frame(&e) => {
                    self.recover_stale(client, index_from_bottom, &mut retry).await?;
                }
                Err(e) => return Err(ProxyError::from_command(e)),
            }
        }
    }
}

async fn lookup_method<C: DebuggerClient>(
    client: &mut C,
    location: &Location,
) -> ProxyResult<MethodInfo> {
    let methods = client.type_methods(location.class_id).await?;
    methods
        .into_iter()
        .find(|m| m.method_id == location.method_id)
        .ok_or_else(|| {
            ProxyError::Transport(JdwpError::Protocol(format!(
                "method {} not found in type {}",
                location.method_id, location.class_id
            )))
        })
}

async fn build_descriptors<C: DebuggerClient>(
    client: &mut C,
    location: &Location,
    method: &MethodInfo,
    mode: FetchMode,
    fetch_path: ValueFetchPath,
    supplied_names: Option<&SlotNameTable>,
) -> ProxyResult<Vec<LocalVariableDescriptor>> {
    if mode == FetchMode::Fast {
        return Ok(parameter_descriptors(&method.signature, method.is_static()));
    }

    let names = match supplied_names {
        Some(names) => names.clone(),
        None => fetch_name_table(client, location).await?,
    };

    match fetch_path {
        ValueFetchPath::BytecodeRecovery if method.has_bytecode() => {
            let code = client
                .bytecodes(location.class_id, location.method_id)
                .await
                .map_err(ProxyError::from_command)?;
            Ok(recover_descriptors(
                &code,
                location.index,
                &method.signature,
                method.is_static(),
                &names,
            ))
        }
        _ => Ok(table_descriptors(method, &names)),
    }
}

/// Name candidates from the symbolic variable table; an absent table is
/// a normal outcome for code compiled without debug info.
async fn fetch_name_table<C: DebuggerClient>(
    client: &mut C,
    location: &Location,
) -> ProxyResult<SlotNameTable> {
    match client
        .variable_table(location.class_id, location.method_id)
        .await
    {
        Ok(table) => Ok(SlotNameTable::from_variable_table(&table, location.index)),
        Err(e)
            if e.command_code()
                .is_some_and(|code| code == ErrorCode::AbsentInformation) =>
        {
            Ok(SlotNameTable::new())
        }
        Err(e) => Err(ProxyError::from_command(e)),
    }
}

/// Degraded full-mode descriptors: declared parameters plus the name
/// table entries visible at the current offset. Types come from the
/// table's signatures, so slots the compiler left out stay invisible.
fn table_descriptors(method: &MethodInfo, names: &SlotNameTable) -> Vec<LocalVariableDescriptor> {
    let mut descriptors = parameter_descriptors(&method.signature, method.is_static());
    let first_local = first_local_slot(&method.signature, method.is_static());

    let mut extra: Vec<u32> = names
        .slots()
        .filter(|slot| *slot >= first_local)
        .collect();
    extra.sort_unstable();
    for slot in extra {
        let sig = names.signature_hint(slot);
        descriptors.push(LocalVariableDescriptor::new(slot, false, sig));
    }

    for descriptor in &mut descriptors {
        if let Some(candidates) = names.candidates(descriptor.slot) {
            descriptor.names = candidates.clone();
        }
    }
    descriptors
}

/// Fetch values for a descriptor list in one round trip when the VM
/// cooperates. A corruption reply shrinks the request window by one and
/// retries; a window of one that still fails marks that single slot
/// corrupted and moves on. Stale-frame and fatal errors bubble out
/// untouched for the caller's policy.
async fn fetch_slot_batch<C: DebuggerClient>(
    client: &mut C,
    thread: ThreadId,
    frame: FrameId,
    descriptors: &[LocalVariableDescriptor],
) -> Result<Vec<SlotValue>, JdwpError> {
    let total = descriptors.len();
    let mut results: Vec<Option<SlotValue>> = vec![None; total];
    let mut start = 0;
    let mut window = total;

    while start < total {
        window = window.min(total - start).max(1);
        let batch: Vec<SlotRequest> = descriptors[start..start + window]
            .iter()
            .map(|d| SlotRequest {
                slot: d.slot as i32,
                // An unpinned type is requested as a reference; a
                // mismatch reply then marks just that slot
                sig_byte: d.sig.unwrap_or(tags::OBJECT),
            })
            .collect();

        match client.get_slot_values(thread, frame, &batch).await {
            Ok(values) => {
                for (i, value) in values.into_iter().enumerate().take(window) {
                    results[start + i] = Some(SlotValue::Value(value));
                }
                start += window;
                window = total - start;
            }
            Err(JdwpError::Command(code)) if code.is_debug_info_corrupted() => {
                if window == 1 {
                    debug!(slot = descriptors[start].slot, error = %code, "slot unreadable; marking corrupted");
                    results[start] = Some(SlotValue::Corrupted(code));
                    start += 1;
                    window = total - start;
                } else {
                    window -= 1;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.unwrap_or(SlotValue::Corrupted(ErrorCode::InvalidSlot)))
        .collect())
}
