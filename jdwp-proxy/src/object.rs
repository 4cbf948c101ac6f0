// Remote-object caching
//
// A generic cache for "this remote reference has a dynamic type and may
// have been collected", embedded by composition wherever the original
// design used a proxy inheritance chain.

use crate::client::DebuggerClient;
use crate::clock::{CacheStamp, InvalidationClock};
use crate::error::{ProxyError, ProxyResult};
use jdwp_transport::types::{ObjectId, ReferenceTypeId};

/// Tri-state collection flag. Invalidation may revert `No` to `Unknown`,
/// but `Yes` is terminal: a collected object never becomes live again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collected {
    #[default]
    Unknown,
    No,
    Yes,
}

#[derive(Debug)]
pub struct RemoteObjectCache {
    stamp: CacheStamp,
    reference_type: Option<(u8, ReferenceTypeId)>,
    collected: Collected,
}

impl RemoteObjectCache {
    pub fn new(clock: &InvalidationClock) -> Self {
        Self {
            stamp: CacheStamp::new(clock),
            reference_type: None,
            collected: Collected::Unknown,
        }
    }

    fn ensure_fresh(&mut self, clock: &InvalidationClock) {
        if self.stamp.refresh(clock) {
            self.reference_type = None;
            if self.collected == Collected::No {
                self.collected = Collected::Unknown;
            }
        }
    }

    /// Dynamic type of the reference: (ref-type tag, type id).
    pub async fn reference_type<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        object: ObjectId,
    ) -> ProxyResult<(u8, ReferenceTypeId)> {
        self.ensure_fresh(clock);
        if self.collected == Collected::Yes {
            return Err(ProxyError::ObjectCollected(object));
        }
        if let Some(cached) = self.reference_type {
            return Ok(cached);
        }

        let fetched = client.object_reference_type(object).await?;
        self.reference_type = Some(fetched);
        Ok(fetched)
    }

    /// Whether the target's collector already reclaimed the object.
    /// Once true, cached forever; never asked again.
    pub async fn is_collected<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
        object: ObjectId,
    ) -> ProxyResult<bool> {
        self.ensure_fresh(clock);
        match self.collected {
            Collected::Yes => Ok(true),
            Collected::No => Ok(false),
            Collected::Unknown => {
                let collected = client.object_is_collected(object).await?;
                self.collected = if collected {
                    Collected::Yes
                } else {
                    Collected::No
                };
                Ok(collected)
            }
        }
    }

    pub fn known_collected(&self) -> bool {
        self.collected == Collected::Yes
    }

    #[cfg(test)]
    pub(crate) fn collected_state(&self) -> Collected {
        self.collected
    }
}

/// Caching proxy for an arbitrary remote object reference.
#[derive(Debug)]
pub struct ObjectReferenceProxy {
    object: ObjectId,
    cache: RemoteObjectCache,
}

impl ObjectReferenceProxy {
    pub fn new(object: ObjectId, clock: &InvalidationClock) -> Self {
        Self {
            object,
            cache: RemoteObjectCache::new(clock),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object
    }

    pub async fn reference_type<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<(u8, ReferenceTypeId)> {
        self.cache.reference_type(client, clock, self.object).await
    }

    pub async fn is_collected<C: DebuggerClient>(
        &mut self,
        client: &mut C,
        clock: &InvalidationClock,
    ) -> ProxyResult<bool> {
        self.cache.is_collected(client, clock, self.object).await
    }

    /// True once the object was observed collected. Used by the session
    /// registry to evict entries that will never serve a value again.
    pub fn known_collected(&self) -> bool {
        self.cache.known_collected()
    }
}
