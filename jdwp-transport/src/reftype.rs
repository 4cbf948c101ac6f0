// ReferenceType command implementations
//
// Commands for working with classes, interfaces, and arrays

use crate::commands::{command_sets, reference_type_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_i32, read_string, read_u64, read_u8};
use crate::types::{ClassLoaderId, MethodId, ReferenceTypeId};
use bytes::BufMut;
use serde::{Deserialize, Serialize};

/// Method information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

pub const ACC_STATIC: i32 = 0x0008;
pub const ACC_NATIVE: i32 = 0x0100;
pub const ACC_ABSTRACT: i32 = 0x0400;

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.mod_bits & ACC_STATIC != 0
    }

    /// Native and abstract methods carry no instruction stream.
    pub fn has_bytecode(&self) -> bool {
        self.mod_bits & (ACC_NATIVE | ACC_ABSTRACT) == 0
    }
}

/// A nested type as reported by the VM (direct and indirect members)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NestedType {
    pub ref_type_tag: u8,
    pub type_id: ReferenceTypeId,
}

impl JdwpConnection {
    /// JNI signature of a reference type (ReferenceType.Signature command)
    pub async fn type_signature(&mut self, ref_type_id: ReferenceTypeId) -> JdwpResult<String> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::REFERENCE_TYPE,
            reference_type_commands::SIGNATURE,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_string(&mut data)
    }

    /// The class loader that defined a type (ReferenceType.ClassLoader command).
    /// Zero means the bootstrap loader.
    pub async fn type_class_loader(
        &mut self,
        ref_type_id: ReferenceTypeId,
    ) -> JdwpResult<ClassLoaderId> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::REFERENCE_TYPE,
            reference_type_commands::CLASS_LOADER,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_u64(&mut data)
    }

    /// Declared methods of a reference type (ReferenceType.Methods command)
    pub async fn type_methods(
        &mut self,
        ref_type_id: ReferenceTypeId,
    ) -> JdwpResult<Vec<MethodInfo>> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::REFERENCE_TYPE,
            reference_type_commands::METHODS,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let count = read_i32(&mut data)?;
        let mut methods = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            methods.push(MethodInfo {
                method_id: read_u64(&mut data)?,
                name: read_string(&mut data)?,
                signature: read_string(&mut data)?,
                mod_bits: read_i32(&mut data)?,
            });
        }

        Ok(methods)
    }

    /// All types nested within a type, at any depth
    /// (ReferenceType.NestedTypes command)
    pub async fn nested_types(
        &mut self,
        ref_type_id: ReferenceTypeId,
    ) -> JdwpResult<Vec<NestedType>> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::REFERENCE_TYPE,
            reference_type_commands::NESTED_TYPES,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let count = read_i32(&mut data)?;
        let mut nested = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            nested.push(NestedType {
                ref_type_tag: read_u8(&mut data)?,
                type_id: read_u64(&mut data)?,
            });
        }

        Ok(nested)
    }
}
