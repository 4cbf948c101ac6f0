// JDWP wire-protocol client
//
// Implements the subset of the JDWP protocol a state-inspection proxy
// layer needs:
// - Connection management (attach, handshake, reply routing, dispose)
// - Thread, frame, and slot-value commands
// - Class metadata, variable tables, and raw bytecode fetch
// - The fixed protocol error-code enumeration with recovery classification
//
// Event and breakpoint machinery is deliberately out of scope.

pub mod commands;
pub mod connection;
pub mod method;
pub mod object;
pub mod protocol;
pub mod reader;
pub mod reftype;
pub mod replyloop;
pub mod stackframe;
pub mod thread;
pub mod types;
pub mod vm;

pub use connection::JdwpConnection;
pub use method::VariableTable;
pub use protocol::{ErrorCode, JdwpError, JdwpResult};
pub use reftype::{MethodInfo, NestedType};
pub use stackframe::SlotRequest;
pub use types::{
    FrameId, FrameInfo, Location, MethodId, ObjectId, ReferenceTypeId, SuspendStatus,
    ThreadGroupId, ThreadId, ThreadStatus, Value, ValueData, Variable,
};
pub use vm::{LoadedClass, VmCapabilities, VmIdSizes, VmVersion};
