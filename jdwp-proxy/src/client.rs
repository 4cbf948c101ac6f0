// The transport seam
//
// The proxy layer talks to the VM through this trait rather than a
// concrete socket, so tests can script a mock. The method set is exactly
// the remote surface the proxies issue; the blanket impl delegates to
// `jdwp_transport::JdwpConnection`.

use jdwp_transport::method::VariableTable;
use jdwp_transport::reftype::{MethodInfo, NestedType};
use jdwp_transport::stackframe::SlotRequest;
use jdwp_transport::types::{
    ClassLoaderId, FrameId, FrameInfo, MethodId, ObjectId, ReferenceTypeId, SuspendStatus,
    ThreadGroupId, ThreadId, ThreadStatus, Value,
};
use jdwp_transport::vm::{LoadedClass, VmCapabilities};
use jdwp_transport::{JdwpConnection, JdwpResult};

#[allow(async_fn_in_trait)]
pub trait DebuggerClient {
    async fn capabilities(&mut self) -> JdwpResult<VmCapabilities>;
    async fn all_threads(&mut self) -> JdwpResult<Vec<ThreadId>>;
    async fn all_classes(&mut self) -> JdwpResult<Vec<LoadedClass>>;
    async fn suspend_all(&mut self) -> JdwpResult<()>;
    async fn resume_all(&mut self) -> JdwpResult<()>;
    async fn dispose(&mut self) -> JdwpResult<()>;

    async fn type_signature(&mut self, type_id: ReferenceTypeId) -> JdwpResult<String>;
    async fn type_class_loader(&mut self, type_id: ReferenceTypeId) -> JdwpResult<ClassLoaderId>;
    async fn type_methods(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>>;
    async fn nested_types(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<NestedType>>;

    async fn variable_table(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<VariableTable>;
    async fn bytecodes(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Vec<u8>>;

    async fn thread_name(&mut self, thread: ThreadId) -> JdwpResult<String>;
    async fn thread_status(
        &mut self,
        thread: ThreadId,
    ) -> JdwpResult<(ThreadStatus, SuspendStatus)>;
    async fn thread_group_of(&mut self, thread: ThreadId) -> JdwpResult<ThreadGroupId>;
    async fn thread_is_virtual(&mut self, thread: ThreadId) -> JdwpResult<bool>;
    async fn frames(
        &mut self,
        thread: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<FrameInfo>>;
    async fn frame_count(&mut self, thread: ThreadId) -> JdwpResult<i32>;

    async fn thread_group_name(&mut self, group: ThreadGroupId) -> JdwpResult<String>;
    async fn thread_group_parent(&mut self, group: ThreadGroupId) -> JdwpResult<ThreadGroupId>;

    async fn object_reference_type(
        &mut self,
        object: ObjectId,
    ) -> JdwpResult<(u8, ReferenceTypeId)>;
    async fn object_is_collected(&mut self, object: ObjectId) -> JdwpResult<bool>;

    async fn get_slot_values(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
        slots: &[SlotRequest],
    ) -> JdwpResult<Vec<Value>>;
    async fn set_slot_value(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
        slot: i32,
        value: &Value,
    ) -> JdwpResult<()>;
    async fn frame_this_object(&mut self, thread: ThreadId, frame: FrameId) -> JdwpResult<Value>;
}

impl DebuggerClient for JdwpConnection {
    async fn capabilities(&mut self) -> JdwpResult<VmCapabilities> {
        JdwpConnection::capabilities(self).await
    }

    async fn all_threads(&mut self) -> JdwpResult<Vec<ThreadId>> {
        JdwpConnection::all_threads(self).await
    }

    async fn all_classes(&mut self) -> JdwpResult<Vec<LoadedClass>> {
        JdwpConnection::all_classes(self).await
    }

    async fn suspend_all(&mut self) -> JdwpResult<()> {
        JdwpConnection::suspend_all(self).await
    }

    async fn resume_all(&mut self) -> JdwpResult<()> {
        JdwpConnection::resume_all(self).await
    }

    async fn dispose(&mut self) -> JdwpResult<()> {
        JdwpConnection::dispose(self).await
    }

    async fn type_signature(&mut self, type_id: ReferenceTypeId) -> JdwpResult<String> {
        JdwpConnection::type_signature(self, type_id).await
    }

    async fn type_class_loader(&mut self, type_id: ReferenceTypeId) -> JdwpResult<ClassLoaderId> {
        JdwpConnection::type_class_loader(self, type_id).await
    }

    async fn type_methods(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>> {
        JdwpConnection::type_methods(self, type_id).await
    }

    async fn nested_types(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<NestedType>> {
        JdwpConnection::nested_types(self, type_id).await
    }

    async fn variable_table(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<VariableTable> {
        JdwpConnection::variable_table(self, type_id, method_id).await
    }

    async fn bytecodes(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Vec<u8>> {
        JdwpConnection::bytecodes(self, type_id, method_id).await
    }

    async fn thread_name(&mut self, thread: ThreadId) -> JdwpResult<String> {
        JdwpConnection::thread_name(self, thread).await
    }

    async fn thread_status(
        &mut self,
        thread: ThreadId,
    ) -> JdwpResult<(ThreadStatus, SuspendStatus)> {
        JdwpConnection::thread_status(self, thread).await
    }

    async fn thread_group_of(&mut self, thread: ThreadId) -> JdwpResult<ThreadGroupId> {
        JdwpConnection::thread_group_of(self, thread).await
    }

    async fn thread_is_virtual(&mut self, thread: ThreadId) -> JdwpResult<bool> {
        JdwpConnection::thread_is_virtual(self, thread).await
    }

    async fn frames(
        &mut self,
        thread: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<FrameInfo>> {
        JdwpConnection::frames(self, thread, start_frame, length).await
    }

    async fn frame_count(&mut self, thread: ThreadId) -> JdwpResult<i32> {
        JdwpConnection::frame_count(self, thread).await
    }

    async fn thread_group_name(&mut self, group: ThreadGroupId) -> JdwpResult<String> {
        JdwpConnection::thread_group_name(self, group).await
    }

    async fn thread_group_parent(&mut self, group: ThreadGroupId) -> JdwpResult<ThreadGroupId> {
        JdwpConnection::thread_group_parent(self, group).await
    }

    async fn object_reference_type(
        &mut self,
        object: ObjectId,
    ) -> JdwpResult<(u8, ReferenceTypeId)> {
        JdwpConnection::object_reference_type(self, object).await
    }

    async fn object_is_collected(&mut self, object: ObjectId) -> JdwpResult<bool> {
        JdwpConnection::object_is_collected(self, object).await
    }

    async fn get_slot_values(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
        slots: &[SlotRequest],
    ) -> JdwpResult<Vec<Value>> {
        JdwpConnection::get_slot_values(self, thread, frame, slots).await
    }

    async fn set_slot_value(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
        slot: i32,
        value: &Value,
    ) -> JdwpResult<()> {
        JdwpConnection::set_slot_value(self, thread, frame, slot, value).await
    }

    async fn frame_this_object(&mut self, thread: ThreadId, frame: FrameId) -> JdwpResult<Value> {
        JdwpConnection::frame_this_object(self, thread, frame).await
    }
}

/// How frame-local values are recovered, resolved once at session
/// construction from the VM's capability flags. An ordinary branch on
/// this enum selects the code path; there is no runtime probing after
/// attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFetchPath {
    /// Full recovery: walk the method's instruction stream to find live
    /// slots, then fetch them by raw slot index.
    BytecodeRecovery,
    /// Degraded: only the symbolic variable table (and the declared
    /// parameters derived from the method signature) are available.
    VariableTableOnly,
}

impl ValueFetchPath {
    pub fn resolve(caps: &VmCapabilities) -> Self {
        if caps.can_get_bytecodes && caps.can_get_constant_pool {
            ValueFetchPath::BytecodeRecovery
        } else {
            ValueFetchPath::VariableTableOnly
        }
    }
}
