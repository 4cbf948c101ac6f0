// JDWP command set and command identifiers
//
// Only the sets the proxy layer issues are listed here; event and
// breakpoint machinery is intentionally absent.

pub mod command_sets {
    pub const VIRTUAL_MACHINE: u8 = 1;
    pub const REFERENCE_TYPE: u8 = 2;
    pub const METHOD: u8 = 6;
    pub const OBJECT_REFERENCE: u8 = 9;
    pub const THREAD_REFERENCE: u8 = 11;
    pub const THREAD_GROUP_REFERENCE: u8 = 12;
    pub const STACK_FRAME: u8 = 16;
}

// VirtualMachine commands (set 1)
pub mod vm_commands {
    pub const VERSION: u8 = 1;
    pub const ALL_CLASSES: u8 = 3;
    pub const ALL_THREADS: u8 = 4;
    pub const DISPOSE: u8 = 6;
    pub const ID_SIZES: u8 = 7;
    pub const SUSPEND: u8 = 8;
    pub const RESUME: u8 = 9;
    pub const CAPABILITIES_NEW: u8 = 17;
}

// ReferenceType commands (set 2)
pub mod reference_type_commands {
    pub const SIGNATURE: u8 = 1;
    pub const CLASS_LOADER: u8 = 2;
    pub const METHODS: u8 = 5;
    pub const NESTED_TYPES: u8 = 8;
}

// Method commands (set 6)
pub mod method_commands {
    pub const VARIABLE_TABLE: u8 = 2;
    pub const BYTECODES: u8 = 3;
}

// ObjectReference commands (set 9)
pub mod object_commands {
    pub const REFERENCE_TYPE: u8 = 1;
    pub const IS_COLLECTED: u8 = 9;
}

// ThreadReference commands (set 11)
pub mod thread_commands {
    pub const NAME: u8 = 1;
    pub const SUSPEND: u8 = 2;
    pub const RESUME: u8 = 3;
    pub const STATUS: u8 = 4;
    pub const THREAD_GROUP: u8 = 5;
    pub const FRAMES: u8 = 6;
    pub const FRAME_COUNT: u8 = 7;
    pub const IS_VIRTUAL: u8 = 15;
}

// ThreadGroupReference commands (set 12)
pub mod thread_group_commands {
    pub const NAME: u8 = 1;
    pub const PARENT: u8 = 2;
}

// StackFrame commands (set 16)
pub mod stack_frame_commands {
    pub const GET_VALUES: u8 = 1;
    pub const SET_VALUES: u8 = 2;
    pub const THIS_OBJECT: u8 = 3;
}
