// JDWP protocol definitions and packet handling
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

// JDWP uses big-endian (network byte order) for all multi-byte values.

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid handshake")]
    InvalidHandshake,

    #[error("Command failed: {0}")]
    Command(ErrorCode),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection already disposed")]
    Disposed,
}

impl JdwpError {
    /// The JDWP error code carried by a failed command reply, if any.
    pub fn command_code(&self) -> Option<ErrorCode> {
        match self {
            JdwpError::Command(code) => Some(*code),
            _ => None,
        }
    }

    /// True for errors that mean the remote VM is unreachable or gone.
    /// Nothing above the transport should retry after one of these.
    pub fn is_fatal(&self) -> bool {
        match self {
            JdwpError::Io(_) | JdwpError::ConnectionClosed | JdwpError::Disposed => true,
            JdwpError::Command(code) => code.is_vm_gone(),
            _ => false,
        }
    }
}

/// The fixed set of JDWP reply error codes.
///
/// Anything a conforming VM does not define is preserved raw in `Unknown`.
/// The classification helpers encode which recovery policy applies, so the
/// proxy layer never matches on raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidThread,
    InvalidThreadGroup,
    InvalidPriority,
    ThreadNotSuspended,
    ThreadSuspended,
    InvalidObject,
    InvalidClass,
    ClassNotPrepared,
    InvalidMethodId,
    InvalidLocation,
    InvalidFieldId,
    InvalidFrameId,
    NoMoreFrames,
    OpaqueFrame,
    NotCurrentFrame,
    TypeMismatch,
    InvalidSlot,
    Duplicate,
    NotFound,
    InvalidMonitor,
    NotMonitorOwner,
    Interrupt,
    InvalidClassFormat,
    CircularClassDefinition,
    FailsVerification,
    AddMethodNotImplemented,
    SchemaChangeNotImplemented,
    InvalidTypestate,
    HierarchyChangeNotImplemented,
    DeleteMethodNotImplemented,
    UnsupportedVersion,
    NamesDontMatch,
    ClassModifiersChangeNotImplemented,
    MethodModifiersChangeNotImplemented,
    NotImplemented,
    NullPointer,
    AbsentInformation,
    InvalidEventType,
    IllegalArgument,
    OutOfMemory,
    AccessDenied,
    VmDead,
    Internal,
    UnattachedThread,
    InvalidTag,
    AlreadyInvoking,
    InvalidIndex,
    InvalidLength,
    InvalidString,
    InvalidClassLoader,
    InvalidArray,
    TransportLoad,
    TransportInit,
    NativeMethod,
    InvalidCount,
    Unknown(u16),
}

impl ErrorCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            10 => ErrorCode::InvalidThread,
            11 => ErrorCode::InvalidThreadGroup,
            12 => ErrorCode::InvalidPriority,
            13 => ErrorCode::ThreadNotSuspended,
            14 => ErrorCode::ThreadSuspended,
            20 => ErrorCode::InvalidObject,
            21 => ErrorCode::InvalidClass,
            22 => ErrorCode::ClassNotPrepared,
            23 => ErrorCode::InvalidMethodId,
            24 => ErrorCode::InvalidLocation,
            25 => ErrorCode::InvalidFieldId,
            30 => ErrorCode::InvalidFrameId,
            31 => ErrorCode::NoMoreFrames,
            32 => ErrorCode::OpaqueFrame,
            33 => ErrorCode::NotCurrentFrame,
            34 => ErrorCode::TypeMismatch,
            35 => ErrorCode::InvalidSlot,
            40 => ErrorCode::Duplicate,
            41 => ErrorCode::NotFound,
            50 => ErrorCode::InvalidMonitor,
            51 => ErrorCode::NotMonitorOwner,
            52 => ErrorCode::Interrupt,
            60 => ErrorCode::InvalidClassFormat,
            61 => ErrorCode::CircularClassDefinition,
            62 => ErrorCode::FailsVerification,
            63 => ErrorCode::AddMethodNotImplemented,
            64 => ErrorCode::SchemaChangeNotImplemented,
            65 => ErrorCode::InvalidTypestate,
            66 => ErrorCode::HierarchyChangeNotImplemented,
            67 => ErrorCode::DeleteMethodNotImplemented,
            68 => ErrorCode::UnsupportedVersion,
            69 => ErrorCode::NamesDontMatch,
            70 => ErrorCode::ClassModifiersChangeNotImplemented,
            71 => ErrorCode::MethodModifiersChangeNotImplemented,
            99 => ErrorCode::NotImplemented,
            100 => ErrorCode::NullPointer,
            101 => ErrorCode::AbsentInformation,
            102 => ErrorCode::InvalidEventType,
            103 => ErrorCode::IllegalArgument,
            110 => ErrorCode::OutOfMemory,
            111 => ErrorCode::AccessDenied,
            112 => ErrorCode::VmDead,
            113 => ErrorCode::Internal,
            115 => ErrorCode::UnattachedThread,
            500 => ErrorCode::InvalidTag,
            502 => ErrorCode::AlreadyInvoking,
            503 => ErrorCode::InvalidIndex,
            504 => ErrorCode::InvalidLength,
            506 => ErrorCode::InvalidString,
            507 => ErrorCode::InvalidClassLoader,
            508 => ErrorCode::InvalidArray,
            509 => ErrorCode::TransportLoad,
            510 => ErrorCode::TransportInit,
            511 => ErrorCode::NativeMethod,
            512 => ErrorCode::InvalidCount,
            other => ErrorCode::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::InvalidThread => "INVALID_THREAD",
            ErrorCode::InvalidThreadGroup => "INVALID_THREAD_GROUP",
            ErrorCode::InvalidPriority => "INVALID_PRIORITY",
            ErrorCode::ThreadNotSuspended => "THREAD_NOT_SUSPENDED",
            ErrorCode::ThreadSuspended => "THREAD_SUSPENDED",
            ErrorCode::InvalidObject => "INVALID_OBJECT",
            ErrorCode::InvalidClass => "INVALID_CLASS",
            ErrorCode::ClassNotPrepared => "CLASS_NOT_PREPARED",
            ErrorCode::InvalidMethodId => "INVALID_METHODID",
            ErrorCode::InvalidLocation => "INVALID_LOCATION",
            ErrorCode::InvalidFieldId => "INVALID_FIELDID",
            ErrorCode::InvalidFrameId => "INVALID_FRAMEID",
            ErrorCode::NoMoreFrames => "NO_MORE_FRAMES",
            ErrorCode::OpaqueFrame => "OPAQUE_FRAME",
            ErrorCode::NotCurrentFrame => "NOT_CURRENT_FRAME",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::InvalidSlot => "INVALID_SLOT",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidMonitor => "INVALID_MONITOR",
            ErrorCode::NotMonitorOwner => "NOT_MONITOR_OWNER",
            ErrorCode::Interrupt => "INTERRUPT",
            ErrorCode::InvalidClassFormat => "INVALID_CLASS_FORMAT",
            ErrorCode::CircularClassDefinition => "CIRCULAR_CLASS_DEFINITION",
            ErrorCode::FailsVerification => "FAILS_VERIFICATION",
            ErrorCode::AddMethodNotImplemented => "ADD_METHOD_NOT_IMPLEMENTED",
            ErrorCode::SchemaChangeNotImplemented => "SCHEMA_CHANGE_NOT_IMPLEMENTED",
            ErrorCode::InvalidTypestate => "INVALID_TYPESTATE",
            ErrorCode::HierarchyChangeNotImplemented => "HIERARCHY_CHANGE_NOT_IMPLEMENTED",
            ErrorCode::DeleteMethodNotImplemented => "DELETE_METHOD_NOT_IMPLEMENTED",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::NamesDontMatch => "NAMES_DONT_MATCH",
            ErrorCode::ClassModifiersChangeNotImplemented => {
                "CLASS_MODIFIERS_CHANGE_NOT_IMPLEMENTED"
            }
            ErrorCode::MethodModifiersChangeNotImplemented => {
                "METHOD_MODIFIERS_CHANGE_NOT_IMPLEMENTED"
            }
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::NullPointer => "NULL_POINTER",
            ErrorCode::AbsentInformation => "ABSENT_INFORMATION",
            ErrorCode::InvalidEventType => "INVALID_EVENT_TYPE",
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::VmDead => "VM_DEAD",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::UnattachedThread => "UNATTACHED_THREAD",
            ErrorCode::InvalidTag => "INVALID_TAG",
            ErrorCode::AlreadyInvoking => "ALREADY_INVOKING",
            ErrorCode::InvalidIndex => "INVALID_INDEX",
            ErrorCode::InvalidLength => "INVALID_LENGTH",
            ErrorCode::InvalidString => "INVALID_STRING",
            ErrorCode::InvalidClassLoader => "INVALID_CLASS_LOADER",
            ErrorCode::InvalidArray => "INVALID_ARRAY",
            ErrorCode::TransportLoad => "TRANSPORT_LOAD",
            ErrorCode::TransportInit => "TRANSPORT_INIT",
            ErrorCode::NativeMethod => "NATIVE_METHOD",
            ErrorCode::InvalidCount => "INVALID_COUNT",
            ErrorCode::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// The frame handle rotated out from under us (stack shape changed).
    /// Recoverable by clearing the frame-scoped cache and retrying once.
    pub fn is_stale_frame(&self) -> bool {
        matches!(self, ErrorCode::InvalidFrameId)
    }

    /// The thread is not (or no longer) in the state the command requires.
    pub fn is_wrong_thread_state(&self) -> bool {
        matches!(self, ErrorCode::InvalidThread | ErrorCode::ThreadNotSuspended)
    }

    /// The request referenced debug information the VM cannot honor
    /// (bad slot, missing tables). Retrying cannot fix these.
    pub fn is_debug_info_corrupted(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidSlot | ErrorCode::AbsentInformation | ErrorCode::TypeMismatch
        )
    }

    pub fn is_vm_gone(&self) -> bool {
        matches!(self, ErrorCode::VmDead)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Unknown(raw) => write!(f, "UNKNOWN_ERROR({raw})"),
            _ => f.write_str(self.name()),
        }
    }
}

// JDWP handshake string
pub const JDWP_HANDSHAKE: &[u8] = b"JDWP-Handshake";

// Packet structure:
// length (4 bytes) - includes header
// id (4 bytes)
// flags (1 byte) - 0x00 = command, 0x80 = reply
// [Command packet: command set (1 byte) + command (1 byte)]
// [Reply packet: error code (2 bytes)]
// data (variable)

pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command_set: u8, command: u8) -> Self {
        Self {
            id,
            command_set,
            command,
            data: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(0x00); // command flag
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }
}

impl ReplyPacket {
    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Protocol("Reply packet too short".to_string()));
        }

        let _length = buf.get_u32();
        let id = buf.get_u32();
        let flags = buf.get_u8();

        if flags != REPLY_FLAG {
            return Err(JdwpError::Protocol(format!("Invalid reply flag: {flags:#x}")));
        }

        let error_code = buf.get_u16();
        let data = buf.to_vec();

        Ok(Self {
            id,
            error_code,
            data,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    pub fn error(&self) -> ErrorCode {
        ErrorCode::from_u16(self.error_code)
    }

    pub fn check_error(&self) -> JdwpResult<()> {
        if self.is_error() {
            Err(JdwpError::Command(self.error()))
        } else {
            Ok(())
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
