// Proxy-layer error taxonomy
//
// Each variant corresponds to one recovery policy: transport errors are
// fatal and never retried; stale frames were already retried once before
// surfacing; corruption is permanent for the offending slot; a collected
// object stays collected.

use jdwp_transport::{ErrorCode, JdwpError};
use thiserror::Error;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("transport error: {0}")]
    Transport(#[from] JdwpError),

    #[error("debug information corrupted: {code}")]
    DebugInfoCorrupted { code: ErrorCode },

    #[error("frame invalidated and retry failed")]
    FrameInvalidated,

    #[error("thread {0} is not suspended")]
    ThreadNotSuspended(u64),

    #[error("object {0} was collected by the target VM")]
    ObjectCollected(u64),

    #[error("resume without a matching suspend (model suspend count is 0)")]
    DoubleResume,

    #[error("session already disposed")]
    Disposed,

    #[error("target VM lacks capability: {0}")]
    UnsupportedCapability(&'static str),
}

impl ProxyError {
    /// Fatal errors short-circuit every retry loop in this layer.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProxyError::Transport(e) => e.is_fatal(),
            ProxyError::Disposed => true,
            _ => false,
        }
    }

    /// Classify a transport error against the recovery taxonomy.
    pub fn from_command(err: JdwpError) -> Self {
        match err.command_code() {
            Some(code) if code.is_debug_info_corrupted() => {
                ProxyError::DebugInfoCorrupted { code }
            }
            _ => ProxyError::Transport(err),
        }
    }
}

/// True when the error is an INVALID_FRAMEID reply: the frame handle
/// rotated and the frame-scoped cache should be cleared before one retry.
pub fn is_stale_frame(err: &JdwpError) -> bool {
    err.command_code().is_some_and(|code| code.is_stale_frame())
}
