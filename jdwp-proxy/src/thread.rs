// Thread and thread-group proxies
//
// Per-thread cached state, including the bottom-indexed frame list.
// Frames are indexed from the base of the stack so that the identity of
// deeper frames survives as shallower ones are pushed while the thread
// stays suspended.

use crate::client::DebuggerClient;
use crate::clock::{CacheStamp, InvalidationClock};
use crate::error::{ProxyError, ProxyResult};
use crate::frame::{FrameHandle, FrameProxy};
use crate::object::RemoteObjectCache;
use jdwp_transport::types::{
    ReferenceTypeId, SuspendStatus, ThreadGroupId, ThreadId, ThreadStatus,
};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ThreadProxy {
    id: ThreadId,
    virtual_thread: bool,
    stamp: CacheStamp,
    name: Option<String>,
    status: Option<(ThreadStatus, SuspendStatus)>,
    frame_count: Option<i32>,
    group: Option<ThreadGroupId>,
    pub(crate) frames_from_bottom: Vec<FrameProxy>,
    object: RemoteObjectCache,
}

impl ThreadProxy {
    pub fn new(id: ThreadId, virtual_thread: bool, clock: &InvalidationClock) -> Self {
        Self {
            id,
            virtual_thread,
            stamp: CacheStamp::new(clock),
            name: None,
            status: None,
            frame_count: None,
            group: None,
            frames_from_bottom: Vec::new(),
            object: RemoteObjectCache::new(clock),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_thread
    }

    // The from-bottom frame list deliberately survives invalidation:
    // deep frames usually outlive a step, so the next enumeration only
    // trims or extends it. Each entry drops its own frame-scoped cache
    // through its stamp.
    fn clear(&mut self) {
        self.name = None;
        self.status = None;
        self.frame_count = None;
        self.group = None;
    }

    pub(crate) fn ensure_fresh(&mut self, clock: &InvalidationClock) {
        if self.stamp.refresh(clock) {
            self.clear();
        }
    }

    /// Cached display name.
    pub async fn name<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<String> {
        self.ensure_fresh(clock);
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let name = client.thread_name(self.id).await?;
        self.name = Some(name.clone());
        Ok(name)
    }

    /// Cached run state and suspend state.
    pub async fn status<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<(ThreadStatus, SuspendStatus)> {
        self.ensure_fresh(clock);
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = client.thread_status(self.id).await?;
        self.status = Some(status);
        Ok(status)
    }

    /// Cached owning thread group.
    pub async fn thread_group<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<ThreadGroupId> {
        self.ensure_fresh(clock);
        if let Some(group) = self.group {
            return Ok(group);
        }
        let group = client.thread_group_of(self.id).await?;
        self.group = Some(group);
        Ok(group)
    }

    /// Cached stack depth.
    ///
    /// When the VM answers with a thread-state error but still reports the
    /// thread suspended, the count is unknowable and reported as 0. That
    /// inconsistency is a known sharp edge of the underlying protocol
    /// implementation; the recovery policy is deliberate, not a bug.
    pub async fn frame_count<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<i32> {
        self.ensure_fresh(clock);
        if let Some(count) = self.frame_count {
            return Ok(count);
        }

        let count = match client.frame_count(self.id).await {
            Ok(count) => count,
            Err(e)
                if e.command_code()
                    .is_some_and(|code| code.is_wrong_thread_state()) =>
            {
                let (_, suspend) = client.thread_status(self.id).await?;
                if suspend.is_suspended() {
                    warn!(
                        thread = self.id,
                        "frame count unavailable for a thread that reports suspended; treating as 0"
                    );
                    0
                } else {
                    return Err(ProxyError::ThreadNotSuspended(self.id));
                }
            }
            Err(e) => return Err(e.into()),
        };

        self.frame_count = Some(count);
        Ok(count)
    }

    /// All frames, top-first, extending the bottom-indexed cache by only
    /// the delta since the last call. From-bottom indices of previously
    /// returned handles never change while the clock is unchanged.
    pub async fn frames<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<Vec<FrameHandle>> {
        let count = self.frame_count(client, clock).await?.max(0) as usize;

        if self.frames_from_bottom.len() > count {
            // Stack popped: the entries above the live count are gone
            debug!(
                thread = self.id,
                cached = self.frames_from_bottom.len(),
                live = count,
                "trimming popped frames"
            );
            self.frames_from_bottom.truncate(count);
        }

        if self.frames_from_bottom.len() < count {
            let missing = count - self.frames_from_bottom.len();
            let fetched = client
                .frames(self.id, 0, missing as i32)
                .await
                .map_err(ProxyError::from_command)?;

            // The reply is top-first; push deepest-first so from-bottom
            // positions line up under the existing cached run
            for info in fetched.into_iter().rev() {
                self.frames_from_bottom.push(FrameProxy::with_info(info, clock));
            }
        }

        Ok(self.handles_top_first(count))
    }

    /// One full remote fetch, rebuilding the frame list from scratch.
    /// For callers that want a stable fresh snapshot and will not make
    /// further invalidating calls.
    pub async fn force_frames<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<Vec<FrameHandle>> {
        self.ensure_fresh(clock);
        self.frames_from_bottom.clear();

        let fetched = client
            .frames(self.id, 0, -1)
            .await
            .map_err(ProxyError::from_command)?;
        let count = fetched.len();

        for info in fetched.into_iter().rev() {
            self.frames_from_bottom.push(FrameProxy::with_info(info, clock));
        }
        self.frame_count = Some(count as i32);

        Ok(self.handles_top_first(count))
    }

    /// Frame at a top-based index. `None` when the thread is not
    /// suspended or the stack is empty: an observable precondition, not
    /// an error.
    pub async fn frame<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        top_index: u32,
    ) -> ProxyResult<Option<FrameHandle>> {
        let (_, suspend) = self.status(client, clock).await?;
        if !suspend.is_suspended() {
            return Ok(None);
        }
        let count = self.frame_count(client, clock).await?.max(0) as u32;
        if count == 0 || top_index >= count {
            return Ok(None);
        }
        Ok(Some(FrameHandle {
            thread: self.id,
            index_from_bottom: count - top_index,
        }))
    }

    fn handles_top_first(&self, count: usize) -> Vec<FrameHandle> {
        (1..=count as u32)
            .rev()
            .map(|index_from_bottom| FrameHandle {
                thread: self.id,
                index_from_bottom,
            })
            .collect()
    }

    /// Dynamic type of the thread object itself.
    pub async fn reference_type<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<(u8, ReferenceTypeId)> {
        self.object.reference_type(client, clock, self.id).await
    }

    pub async fn is_collected<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<bool> {
        self.object.is_collected(client, clock, self.id).await
    }
}

#[derive(Debug)]
pub struct ThreadGroupProxy {
    id: ThreadGroupId,
    stamp: CacheStamp,
    name: Option<String>,
    parent: Option<Option<ThreadGroupId>>,
    object: RemoteObjectCache,
}

impl ThreadGroupProxy {
    pub fn new(id: ThreadGroupId, clock: &InvalidationClock) -> Self {
        Self {
            id,
            stamp: CacheStamp::new(clock),
            name: None,
            parent: None,
            object: RemoteObjectCache::new(clock),
        }
    }

    pub fn id(&self) -> ThreadGroupId {
        self.id
    }

    fn ensure_fresh(&mut self, clock: &InvalidationClock) {
        if self.stamp.refresh(clock) {
            self.name = None;
            self.parent = None;
        }
    }

    pub async fn name<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<String> {
        self.ensure_fresh(clock);
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let name = client.thread_group_name(self.id).await?;
        self.name = Some(name.clone());
        Ok(name)
    }

    /// Parent group; `None` for a top-level group.
    pub async fn parent<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<Option<ThreadGroupId>> {
        self.ensure_fresh(clock);
        if let Some(parent) = self.parent {
            return Ok(parent);
        }
        let raw = client.thread_group_parent(self.id).await?;
        let parent = (raw != 0).then_some(raw);
        self.parent = Some(parent);
        Ok(parent)
    }

    pub async fn reference_type<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<(u8, ReferenceTypeId)> {
        self.object.reference_type(client, clock, self.id).await
    }

    pub async fn is_collected<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<bool> {
        self.object.is_collected(client, clock, self.id).await
    }
}
