// Session-level registry and suspend bookkeeping
//
// One `SessionProxy` per debuggee connection. It owns the invalidation
// clock, the per-id proxy registries, and the model-side suspend count,
// and is the single entry point for every cached operation. Proxies are
// plain registry entries rather than shared handles, so repeated lookups
// of the same id hand back the same cached state.

use crate::client::{DebuggerClient, ValueFetchPath};
use crate::clock::InvalidationClock;
use crate::error::{ProxyError, ProxyResult};
use crate::frame::{FetchMode, FrameHandle, VariableValue};
use crate::locals::SlotNameTable;
use crate::object::ObjectReferenceProxy;
use crate::thread::{ThreadGroupProxy, ThreadProxy};
use jdwp_transport::types::{
    Location, MethodId, ObjectId, ReferenceTypeId, SuspendStatus, ThreadGroupId, ThreadId,
    ThreadStatus, Value,
};
use jdwp_transport::vm::{LoadedClass, VmCapabilities};
use jdwp_transport::{ErrorCode, JdwpConnection, JdwpError};
use std::collections::HashMap;
use tracing::{debug, info};

pub struct SessionProxy<C: DebuggerClient> {
    client: C,
    clock: InvalidationClock,
    capabilities: VmCapabilities,
    fetch_path: ValueFetchPath,
    threads: HashMap<ThreadId, ThreadProxy>,
    groups: HashMap<ThreadGroupId, ThreadGroupProxy>,
    objects: HashMap<ObjectId, ObjectReferenceProxy>,
    // Uncached stand-in for threads outside the registry (virtual or
    // never enumerated); rebuilt per call
    scratch: ThreadProxy,
    threads_dirty: bool,
    last_enumeration: Vec<ThreadId>,
    all_classes: Option<Vec<LoadedClass>>,
    nested: HashMap<ReferenceTypeId, Vec<ReferenceTypeId>>,
    suspends: u32,
    disposed: bool,
}

/// Resolve a thread id to its registry entry, or to the scratch proxy
/// when the id is not registered. The scratch proxy starts empty every
/// time, so unregistered threads are never cached across calls.
fn resolve_thread<'a>(
    threads: &'a mut HashMap<ThreadId, ThreadProxy>,
    scratch: &'a mut ThreadProxy,
    clock: &InvalidationClock,
    thread: ThreadId,
) -> &'a mut ThreadProxy {
    match threads.get_mut(&thread) {
        Some(proxy) => proxy,
        None => {
            *scratch = ThreadProxy::new(thread, false, clock);
            scratch
        }
    }
}

impl SessionProxy<JdwpConnection> {
    /// Attach over a socket and build the session.
    pub async fn attach(host: &str, port: u16) -> ProxyResult<Self> {
        let client = JdwpConnection::attach(host, port).await?;
        Self::new(client).await
    }
}

impl<C: DebuggerClient> SessionProxy<C> {
    /// Build a session over an already-connected client. The VM's
    /// capability flags are fetched exactly once, here, and the value
    /// fetch path is fixed for the life of the session.
    pub async fn new(mut client: C) -> ProxyResult<Self> {
        let capabilities = client.capabilities().await?;
        let fetch_path = ValueFetchPath::resolve(&capabilities);
        info!(?fetch_path, "debugger session established");
        let clock = InvalidationClock::new();
        let scratch = ThreadProxy::new(0, false, &clock);
        Ok(Self {
            client,
            clock,
            capabilities,
            fetch_path,
            threads: HashMap::new(),
            groups: HashMap::new(),
            objects: HashMap::new(),
            scratch,
            threads_dirty: true,
            last_enumeration: Vec::new(),
            all_classes: None,
            nested: HashMap::new(),
            suspends: 0,
            disposed: false,
        })
    }

    pub fn capabilities(&self) -> &VmCapabilities {
        &self.capabilities
    }

    pub fn fetch_path(&self) -> ValueFetchPath {
        self.fetch_path
    }

    /// Model-side suspend depth. Counts this session's suspend/resume
    /// pairs only; it is not the VM's per-thread suspend count.
    pub fn suspend_count(&self) -> u32 {
        self.suspends
    }

    fn ensure_live(&self) -> ProxyResult<()> {
        if self.disposed {
            return Err(ProxyError::Disposed);
        }
        Ok(())
    }

    // --- suspend / resume ---------------------------------------------

    /// Suspend every thread in the target. Bumps the clock first: the
    /// world is about to change shape, so nothing cached before the
    /// request may survive it.
    pub async fn suspend(&mut self) -> ProxyResult<()> {
        self.ensure_live()?;
        self.clock.bump();
        self.threads_dirty = true;
        self.client.suspend_all().await?;
        self.suspends += 1;
        Ok(())
    }

    /// Resume every thread. The clock is bumped and the thread list
    /// marked dirty before the request goes out, so no reader can
    /// observe pre-resume caches as current once the VM is running.
    pub async fn resume(&mut self) -> ProxyResult<()> {
        self.ensure_live()?;
        if self.suspends == 0 {
            return Err(ProxyError::DoubleResume);
        }
        self.suspends -= 1;
        self.clock.bump();
        self.threads_dirty = true;
        self.client.resume_all().await?;
        Ok(())
    }

    // --- cache maintenance --------------------------------------------

    /// Notification that classes were redefined in the target: location
    /// and method caches keyed by type are no longer trustworthy.
    pub fn class_redefined(&mut self) {
        debug!("class redefinition; dropping type-derived caches");
        self.clock.bump();
        self.all_classes = None;
        self.nested.clear();
    }

    /// Drop every cache unconditionally. Object entries already known
    /// collected are evicted outright: the registry otherwise only
    /// grows, and a collected object has nothing left to cache.
    pub fn clear_caches(&mut self) {
        self.clock.bump();
        self.threads_dirty = true;
        self.all_classes = None;
        self.nested.clear();
        self.objects.retain(|_, proxy| !proxy.known_collected());
    }

    /// A thread-start notification. The proxy is registered eagerly so
    /// its cache exists before the first lookup.
    pub async fn thread_started(&mut self, thread: ThreadId) -> ProxyResult<()> {
        self.ensure_live()?;
        self.threads_dirty = true;
        if !self.is_virtual_thread(thread).await? {
            self.threads
                .entry(thread)
                .or_insert_with(|| ThreadProxy::new(thread, false, &self.clock));
        }
        Ok(())
    }

    /// A thread-death notification: the registry entry is dropped for
    /// good, not just invalidated.
    pub fn thread_stopped(&mut self, thread: ThreadId) {
        self.threads.remove(&thread);
        self.threads_dirty = true;
    }

    // --- enumeration --------------------------------------------------

    async fn is_virtual_thread(&mut self, thread: ThreadId) -> ProxyResult<bool> {
        match self.client.thread_is_virtual(thread).await {
            Ok(v) => Ok(v),
            // Pre-loom VMs do not know the command
            Err(JdwpError::Command(ErrorCode::NotImplemented)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All live threads. Cached until the list is marked dirty; dead
    /// threads' registry entries are dropped, surviving ones keep their
    /// cached state. Virtual threads are reported but never registered:
    /// there can be millions of them, and their stacks churn too fast
    /// for caching to pay off. Entries force-registered for a virtual
    /// thread are exempt from eviction, since AllThreads reports
    /// platform threads only and would always miss them.
    pub async fn all_threads(&mut self) -> ProxyResult<Vec<ThreadId>> {
        self.ensure_live()?;
        if !self.threads_dirty {
            return Ok(self.last_enumeration.clone());
        }

        let ids = self.client.all_threads().await?;
        for &id in &ids {
            if self.threads.contains_key(&id) {
                continue;
            }
            if !self.is_virtual_thread(id).await? {
                self.threads
                    .insert(id, ThreadProxy::new(id, false, &self.clock));
            }
        }
        self.threads
            .retain(|id, proxy| proxy.is_virtual() || ids.contains(id));

        self.last_enumeration = ids.clone();
        self.threads_dirty = false;
        Ok(ids)
    }

    /// Registry entry for a thread, if it has one. Virtual and unknown
    /// threads answer `None`.
    pub fn cached_thread(&self, thread: ThreadId) -> Option<&ThreadProxy> {
        self.threads.get(&thread)
    }

    /// Registry entry for a thread, inserting one if absent. Registers
    /// even threads the enumeration policy skips, for callers that want
    /// caching on a specific virtual thread anyway.
    pub async fn force_thread_proxy(&mut self, thread: ThreadId) -> ProxyResult<&ThreadProxy> {
        self.ensure_live()?;
        if !self.threads.contains_key(&thread) {
            let virtual_thread = self.is_virtual_thread(thread).await?;
            self.threads
                .insert(thread, ThreadProxy::new(thread, virtual_thread, &self.clock));
        }
        Ok(&self.threads[&thread])
    }

    // --- thread operations --------------------------------------------

    pub async fn thread_name(&mut self, thread: ThreadId) -> ProxyResult<String> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .name(client, clock)
            .await
    }

    pub async fn thread_status(
        &mut self,
        thread: ThreadId,
    ) -> ProxyResult<(ThreadStatus, SuspendStatus)> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .status(client, clock)
            .await
    }

    pub async fn thread_frame_count(&mut self, thread: ThreadId) -> ProxyResult<i32> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .frame_count(client, clock)
            .await
    }

    pub async fn thread_group_of(&mut self, thread: ThreadId) -> ProxyResult<ThreadGroupId> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .thread_group(client, clock)
            .await
    }

    pub async fn thread_frames(&mut self, thread: ThreadId) -> ProxyResult<Vec<FrameHandle>> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .frames(client, clock)
            .await
    }

    pub async fn force_thread_frames(
        &mut self,
        thread: ThreadId,
    ) -> ProxyResult<Vec<FrameHandle>> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .force_frames(client, clock)
            .await
    }

    /// Frame by top-based index; `None` when the thread is running or
    /// the index is past the stack depth.
    pub async fn thread_frame(
        &mut self,
        thread: ThreadId,
        top_index: u32,
    ) -> ProxyResult<Option<FrameHandle>> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, thread)
            .frame(client, clock, top_index)
            .await
    }

    // --- frame operations ---------------------------------------------

    pub async fn frame_location(&mut self, frame: FrameHandle) -> ProxyResult<Location> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, frame.thread)
            .frame_location(client, clock, frame.index_from_bottom)
            .await
    }

    pub async fn frame_this_object(&mut self, frame: FrameHandle) -> ProxyResult<Value> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, frame.thread)
            .frame_this_object(client, clock, frame.index_from_bottom)
            .await
    }

    /// Recover and fetch the frame's visible variables.
    pub async fn frame_variables(
        &mut self,
        frame: FrameHandle,
        mode: FetchMode,
    ) -> ProxyResult<Vec<VariableValue>> {
        self.ensure_live()?;
        let fetch_path = self.fetch_path;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, frame.thread)
            .variable_values(client, clock, frame.index_from_bottom, mode, fetch_path)
            .await
    }

    /// `frame_variables` with a caller-supplied name table instead of
    /// the VM's symbolic one; not cached on the frame.
    pub async fn frame_variables_named(
        &mut self,
        frame: FrameHandle,
        mode: FetchMode,
        names: &SlotNameTable,
    ) -> ProxyResult<Vec<VariableValue>> {
        self.ensure_live()?;
        let fetch_path = self.fetch_path;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, frame.thread)
            .variable_values_named(
                client,
                clock,
                frame.index_from_bottom,
                mode,
                fetch_path,
                Some(names),
            )
            .await
    }

    pub async fn set_frame_variable(
        &mut self,
        frame: FrameHandle,
        slot: u32,
        value: &Value,
    ) -> ProxyResult<()> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            threads,
            scratch,
            ..
        } = self;
        resolve_thread(threads, scratch, clock, frame.thread)
            .set_variable(client, clock, frame.index_from_bottom, slot, value)
            .await
    }

    // --- thread group operations --------------------------------------

    pub async fn thread_group_name(&mut self, group: ThreadGroupId) -> ProxyResult<String> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            groups,
            ..
        } = self;
        groups
            .entry(group)
            .or_insert_with(|| ThreadGroupProxy::new(group, clock))
            .name(client, clock)
            .await
    }

    pub async fn thread_group_parent(
        &mut self,
        group: ThreadGroupId,
    ) -> ProxyResult<Option<ThreadGroupId>> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            groups,
            ..
        } = self;
        groups
            .entry(group)
            .or_insert_with(|| ThreadGroupProxy::new(group, clock))
            .parent(client, clock)
            .await
    }

    // --- object operations --------------------------------------------

    pub async fn object_reference_type(
        &mut self,
        object: ObjectId,
    ) -> ProxyResult<(u8, ReferenceTypeId)> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            objects,
            ..
        } = self;
        objects
            .entry(object)
            .or_insert_with(|| ObjectReferenceProxy::new(object, clock))
            .reference_type(client, clock)
            .await
    }

    pub async fn object_is_collected(&mut self, object: ObjectId) -> ProxyResult<bool> {
        self.ensure_live()?;
        let Self {
            client,
            clock,
            objects,
            ..
        } = self;
        objects
            .entry(object)
            .or_insert_with(|| ObjectReferenceProxy::new(object, clock))
            .is_collected(client, clock)
            .await
    }

    // --- type operations ----------------------------------------------

    /// All loaded classes. Fetched once per session; refreshed only by
    /// an explicit `class_redefined` or `clear_caches`.
    pub async fn all_classes(&mut self) -> ProxyResult<&[LoadedClass]> {
        self.ensure_live()?;
        if self.all_classes.is_none() {
            let classes = self.client.all_classes().await?;
            debug!(count = classes.len(), "class list cached");
            self.all_classes = Some(classes);
        }
        Ok(self.all_classes.as_deref().unwrap_or(&[]))
    }

    pub async fn type_signature(&mut self, type_id: ReferenceTypeId) -> ProxyResult<String> {
        self.ensure_live()?;
        Ok(self.client.type_signature(type_id).await?)
    }

    /// Raw bytecode of one method, gated on the capability flag so the
    /// caller gets a typed error instead of a protocol-level rejection.
    pub async fn method_bytecodes(
        &mut self,
        class: ReferenceTypeId,
        method: MethodId,
    ) -> ProxyResult<Vec<u8>> {
        self.ensure_live()?;
        if !self.capabilities.can_get_bytecodes {
            return Err(ProxyError::UnsupportedCapability("canGetBytecodes"));
        }
        Ok(self.client.bytecodes(class, method).await?)
    }

    /// Direct nested (inner) types of a declaring type, computed from
    /// the VM's over-approximate answer and cached per declaring type.
    ///
    /// The raw reply may contain unrelated same-prefix classes and
    /// transitively nested ones; kept are the types whose binary name
    /// extends the declaring name by exactly one `$` segment and whose
    /// defining loader matches.
    pub async fn nested_types(
        &mut self,
        declaring: ReferenceTypeId,
    ) -> ProxyResult<Vec<ReferenceTypeId>> {
        self.ensure_live()?;
        if let Some(cached) = self.nested.get(&declaring) {
            return Ok(cached.clone());
        }

        let declaring_sig = self.client.type_signature(declaring).await?;
        let declaring_loader = self.client.type_class_loader(declaring).await?;
        let declaring_base = trim_signature(&declaring_sig);
        let prefix = format!("{declaring_base}$");

        let raw = self.client.nested_types(declaring).await?;
        let mut candidates: Vec<(ReferenceTypeId, String)> = Vec::new();
        for nested in raw {
            if nested.type_id == declaring {
                continue;
            }
            let sig = self.client.type_signature(nested.type_id).await?;
            let base = trim_signature(&sig).to_string();
            if !base.starts_with(&prefix) {
                continue;
            }
            let loader = self.client.type_class_loader(nested.type_id).await?;
            if loader != declaring_loader {
                continue;
            }
            candidates.push((nested.type_id, base));
        }

        // Keep only direct children: a candidate nested inside another
        // candidate is that candidate's business, not ours
        let direct: Vec<ReferenceTypeId> = candidates
            .iter()
            .filter(|(id, base)| {
                !candidates.iter().any(|(other_id, other_base)| {
                    other_id != id && base.starts_with(&format!("{other_base}$"))
                })
            })
            .map(|(id, _)| *id)
            .collect();

        self.nested.insert(declaring, direct.clone());
        Ok(direct)
    }

    // --- teardown -----------------------------------------------------

    /// End the session. Idempotent; a dead transport during teardown is
    /// not an error worth surfacing.
    pub async fn dispose(&mut self) -> ProxyResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.threads.clear();
        self.groups.clear();
        self.objects.clear();
        if let Err(e) = self.client.dispose().await {
            debug!(error = %e, "transport already gone during dispose");
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// "Lcom/example/Foo;" -> "Lcom/example/Foo"
fn trim_signature(sig: &str) -> &str {
    sig.strip_suffix(';').unwrap_or(sig)
}
