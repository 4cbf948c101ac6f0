// Method command implementations
//
// Variable tables and raw instruction streams

use crate::commands::{command_sets, method_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_i32, read_string, read_u32, read_u64};
use crate::types::{MethodId, ReferenceTypeId, Variable};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Result of Method.VariableTable: declared argument slot count plus the
/// per-variable scope table. Absent entirely when the class was compiled
/// without debug info (ABSENT_INFORMATION).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableTable {
    pub arg_count: i32,
    pub variables: Vec<Variable>,
}

impl JdwpConnection {
    /// Get the variable table for a method (Method.VariableTable command)
    pub async fn variable_table(
        &mut self,
        ref_type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<VariableTable> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::METHOD,
            method_commands::VARIABLE_TABLE,
        );
        packet.data.put_u64(ref_type_id);
        packet.data.put_u64(method_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let arg_count = read_i32(&mut data)?;
        let count = read_i32(&mut data)?;
        let mut variables = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            variables.push(Variable {
                code_index: read_u64(&mut data)?,
                name: read_string(&mut data)?,
                signature: read_string(&mut data)?,
                length: read_u32(&mut data)?,
                slot: read_u32(&mut data)?,
            });
        }

        Ok(VariableTable {
            arg_count,
            variables,
        })
    }

    /// Get a method's raw instruction stream (Method.Bytecodes command)
    ///
    /// Gated by the can-get-bytecodes capability; callers check that flag
    /// before issuing this.
    pub async fn bytecodes(
        &mut self,
        ref_type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Vec<u8>> {
        let id = self.next_id();
        let mut packet =
            CommandPacket::new(id, command_sets::METHOD, method_commands::BYTECODES);
        packet.data.put_u64(ref_type_id);
        packet.data.put_u64(method_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let len = read_i32(&mut data)?.max(0) as usize;
        if data.remaining() < len {
            return Err(crate::protocol::JdwpError::Protocol(format!(
                "Bytecode stream truncated: declared {len}, got {}",
                data.remaining()
            )));
        }

        Ok(data[..len].to_vec())
    }
}
