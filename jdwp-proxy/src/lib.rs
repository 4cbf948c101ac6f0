// Caching proxy layer over a JDWP connection
//
// Mirrors the remote VM's threads, stack frames, thread groups, and
// object references as locally cached proxies, all invalidated together
// by a session-wide generation clock:
// - Session registry with model-side suspend counting
// - Bottom-indexed frame identity that survives frame-id rotation
// - Local-variable recovery from raw bytecode slot analysis
// - Batched slot-value fetch with per-slot corruption isolation

pub mod bytecode;
pub mod client;
pub mod clock;
pub mod error;
pub mod frame;
pub mod locals;
pub mod object;
pub mod session;
pub mod thread;

pub use client::{DebuggerClient, ValueFetchPath};
pub use clock::{CacheStamp, InvalidationClock};
pub use error::{ProxyError, ProxyResult};
pub use frame::{FetchMode, FrameHandle, SlotValue, VariableValue};
pub use locals::{LocalVariableDescriptor, SlotNameTable};
pub use object::{Collected, ObjectReferenceProxy};
pub use session::SessionProxy;
pub use thread::{ThreadGroupProxy, ThreadProxy};
