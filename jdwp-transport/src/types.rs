// JDWP type definitions
//
// Common types used across the JDWP protocol

use serde::{Deserialize, Serialize};

// Object IDs are 8 bytes in JDWP
pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type ThreadGroupId = ObjectId;
pub type ClassLoaderId = ObjectId;

pub type ReferenceTypeId = u64;
pub type ClassId = ReferenceTypeId;

pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// JDWP value type tags (the one-character type signatures)
pub mod tags {
    pub const ARRAY: u8 = b'[';
    pub const BYTE: u8 = b'B';
    pub const CHAR: u8 = b'C';
    pub const OBJECT: u8 = b'L';
    pub const FLOAT: u8 = b'F';
    pub const DOUBLE: u8 = b'D';
    pub const INT: u8 = b'I';
    pub const LONG: u8 = b'J';
    pub const SHORT: u8 = b'S';
    pub const VOID: u8 = b'V';
    pub const BOOLEAN: u8 = b'Z';
    pub const STRING: u8 = b's';
    pub const THREAD: u8 = b't';
    pub const THREAD_GROUP: u8 = b'g';
    pub const CLASS_LOADER: u8 = b'l';
    pub const CLASS_OBJECT: u8 = b'c';

    /// True for tags whose wire payload is an object id.
    pub fn is_object(tag: u8) -> bool {
        matches!(
            tag,
            OBJECT | STRING | THREAD | THREAD_GROUP | CLASS_LOADER | CLASS_OBJECT | ARRAY
        )
    }
}

// Location identifies a code position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8, // 1=class, 2=interface, 3=array
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64, // bytecode index (PC)
}

// Thread status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    Zombie,
    Running,
    Sleeping,
    Monitor,
    Wait,
    Unknown(i32),
}

impl ThreadStatus {
    pub fn from_i32(raw: i32) -> Self {
        match raw {
            0 => ThreadStatus::Zombie,
            1 => ThreadStatus::Running,
            2 => ThreadStatus::Sleeping,
            3 => ThreadStatus::Monitor,
            4 => ThreadStatus::Wait,
            other => ThreadStatus::Unknown(other),
        }
    }
}

// Suspend status is a bit set; only bit 0 is defined
pub const SUSPEND_STATUS_SUSPENDED: i32 = 0x1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspendStatus {
    Running,
    Suspended,
}

impl SuspendStatus {
    pub fn from_i32(raw: i32) -> Self {
        if raw & SUSPEND_STATUS_SUSPENDED != 0 {
            SuspendStatus::Suspended
        } else {
            SuspendStatus::Running
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, SuspendStatus::Suspended)
    }
}

// Tagged value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub tag: u8,
    pub data: ValueData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Object(ObjectId),
    Void,
}

impl Value {
    /// Format value for display
    pub fn format(&self) -> String {
        match &self.data {
            ValueData::Byte(v) => format!("(byte) {v}"),
            ValueData::Char(v) => {
                format!("(char) '{}'", char::from_u32(*v as u32).unwrap_or('?'))
            }
            ValueData::Float(v) => format!("(float) {v}"),
            ValueData::Double(v) => format!("(double) {v}"),
            ValueData::Int(v) => format!("(int) {v}"),
            ValueData::Long(v) => format!("(long) {v}"),
            ValueData::Short(v) => format!("(short) {v}"),
            ValueData::Boolean(v) => format!("(boolean) {v}"),
            ValueData::Object(id) => {
                if *id == 0 {
                    "(object) null".to_string()
                } else {
                    format!("(object) @{id:x}")
                }
            }
            ValueData::Void => "(void)".to_string(),
        }
    }

    pub fn null() -> Self {
        Value {
            tag: tags::OBJECT,
            data: ValueData::Object(0),
        }
    }
}

// Variable table entry (Method.VariableTable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    pub length: u32,
    pub slot: u32,
}

impl Variable {
    /// Whether this table entry is visible at the given code offset.
    pub fn is_visible_at(&self, code_index: u64) -> bool {
        code_index >= self.code_index && code_index < self.code_index + u64::from(self.length)
    }
}

// Stack frame handle plus its code location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub location: Location,
}
