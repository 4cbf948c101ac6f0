// StackFrame command implementations
//
// Slot-addressed reads and writes against a suspended frame

use crate::commands::{command_sets, stack_frame_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpError, JdwpResult};
use crate::reader::{read_i32, read_tagged_value, write_tagged_value};
use crate::types::{FrameId, ThreadId, Value};
use bytes::BufMut;

/// One slot request for StackFrame.GetValues: the slot index and the
/// one-character type signature the value should be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRequest {
    pub slot: i32,
    pub sig_byte: u8,
}

impl JdwpConnection {
    /// Read a batch of local-variable slots in one round trip
    /// (StackFrame.GetValues command)
    pub async fn get_slot_values(
        &mut self,
        thread_id: ThreadId,
        frame_id: FrameId,
        slots: &[SlotRequest],
    ) -> JdwpResult<Vec<Value>> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::STACK_FRAME,
            stack_frame_commands::GET_VALUES,
        );

        packet.data.put_u64(thread_id);
        packet.data.put_u64(frame_id);
        packet.data.put_i32(slots.len() as i32);
        for request in slots {
            packet.data.put_i32(request.slot);
            packet.data.put_u8(request.sig_byte);
        }

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        let count = read_i32(&mut data)?;
        if count as usize != slots.len() {
            return Err(JdwpError::Protocol(format!(
                "GetValues answered {count} values for {} slots",
                slots.len()
            )));
        }

        let mut values = Vec::with_capacity(slots.len());
        for _ in 0..count {
            values.push(read_tagged_value(&mut data)?);
        }

        Ok(values)
    }

    /// Write one local-variable slot (StackFrame.SetValues command)
    pub async fn set_slot_value(
        &mut self,
        thread_id: ThreadId,
        frame_id: FrameId,
        slot: i32,
        value: &Value,
    ) -> JdwpResult<()> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::STACK_FRAME,
            stack_frame_commands::SET_VALUES,
        );

        packet.data.put_u64(thread_id);
        packet.data.put_u64(frame_id);
        packet.data.put_i32(1);
        packet.data.put_i32(slot);
        write_tagged_value(&mut packet.data, value);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// The frame's `this` reference; a null object value for static and
    /// native frames (StackFrame.ThisObject command)
    pub async fn frame_this_object(
        &mut self,
        thread_id: ThreadId,
        frame_id: FrameId,
    ) -> JdwpResult<Value> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::STACK_FRAME,
            stack_frame_commands::THIS_OBJECT,
        );

        packet.data.put_u64(thread_id);
        packet.data.put_u64(frame_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_tagged_value(&mut data)
    }
}
