// ObjectReference command implementations
//
// Remote object identity: dynamic type and collection state

use crate::commands::{command_sets, object_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_bool, read_u64, read_u8};
use crate::types::{ObjectId, ReferenceTypeId};
use bytes::BufMut;

impl JdwpConnection {
    /// Runtime type of an object (ObjectReference.ReferenceType command)
    ///
    /// Returns the ref-type tag (1=class, 2=interface, 3=array) and the
    /// reference type id.
    pub async fn object_reference_type(
        &mut self,
        object_id: ObjectId,
    ) -> JdwpResult<(u8, ReferenceTypeId)> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::OBJECT_REFERENCE,
            object_commands::REFERENCE_TYPE,
        );
        packet.data.put_u64(object_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let ref_type_tag = read_u8(&mut data)?;
        let type_id = read_u64(&mut data)?;

        Ok((ref_type_tag, type_id))
    }

    /// Whether the target's collector has reclaimed the object
    /// (ObjectReference.IsCollected command)
    pub async fn object_is_collected(&mut self, object_id: ObjectId) -> JdwpResult<bool> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(
            id,
            command_sets::OBJECT_REFERENCE,
            object_commands::IS_COLLECTED,
        );
        packet.data.put_u64(object_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_bool(&mut data)
    }
}
