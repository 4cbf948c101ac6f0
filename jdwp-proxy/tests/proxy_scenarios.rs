// End-to-end proxy scenarios against a scripted in-memory client.
//
// The mock shares its state behind an Arc so tests can mutate the
// "remote VM" between calls and inspect which commands actually went
// over the wire.

use jdwp_proxy::{
    DebuggerClient, FetchMode, ProxyError, SessionProxy, SlotValue, ThreadProxy, ValueFetchPath,
};
use jdwp_transport::method::VariableTable;
use jdwp_transport::reftype::{MethodInfo, NestedType, ACC_STATIC};
use jdwp_transport::types::{
    tags, ClassLoaderId, FrameId, FrameInfo, Location, MethodId, ObjectId, ReferenceTypeId,
    SuspendStatus, ThreadGroupId, ThreadId, ThreadStatus, Value, ValueData, Variable,
};
use jdwp_transport::vm::{LoadedClass, VmCapabilities};
use jdwp_transport::{ErrorCode, JdwpError, JdwpResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const CLASS: ReferenceTypeId = 0x1000;
const METH: MethodId = 0x2000;
const THREAD: ThreadId = 1;

#[derive(Default)]
struct MockState {
    caps: VmCapabilities,
    threads: Vec<ThreadId>,
    classes: Vec<LoadedClass>,
    virtuals: HashSet<ThreadId>,
    names: HashMap<ThreadId, String>,
    running: HashSet<ThreadId>,
    frames: HashMap<ThreadId, Vec<FrameInfo>>,
    frame_count_wrong_state: HashSet<ThreadId>,
    stale_frames: HashSet<FrameId>,
    rotated: Option<(ThreadId, Vec<FrameInfo>)>,
    methods: HashMap<ReferenceTypeId, Vec<MethodInfo>>,
    bytecode: HashMap<(ReferenceTypeId, MethodId), Vec<u8>>,
    tables: HashMap<(ReferenceTypeId, MethodId), VariableTable>,
    slot_values: HashMap<(FrameId, i32), Value>,
    poisoned: HashSet<(FrameId, i32)>,
    this_objects: HashMap<FrameId, Value>,
    collected: HashSet<ObjectId>,
    ref_types: HashMap<ObjectId, (u8, ReferenceTypeId)>,
    signatures: HashMap<ReferenceTypeId, String>,
    loaders: HashMap<ReferenceTypeId, ClassLoaderId>,
    nested: HashMap<ReferenceTypeId, Vec<NestedType>>,
    groups: HashMap<ThreadId, ThreadGroupId>,
    group_names: HashMap<ThreadGroupId, String>,
    frames_requests: Vec<(i32, i32)>,
    calls: HashMap<&'static str, u32>,
}

impl MockState {
    fn hit(&mut self, op: &'static str) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    // Applied the first time a stale frame id is served, simulating the
    // VM rotating frame ids under a live, still-suspended thread.
    fn rotate(&mut self) {
        if let Some((thread, fresh)) = self.rotated.take() {
            self.frames.insert(thread, fresh);
        }
    }
}

#[derive(Clone)]
struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    fn new(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn calls(&self, op: &'static str) -> u32 {
        self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }
}

fn frame_info(frame_id: FrameId, index: u64) -> FrameInfo {
    FrameInfo {
        frame_id,
        location: Location {
            type_tag: 1,
            class_id: CLASS,
            method_id: METH,
            index,
        },
    }
}

fn int_value(v: i32) -> Value {
    Value {
        tag: tags::INT,
        data: ValueData::Int(v),
    }
}

impl DebuggerClient for MockClient {
    async fn capabilities(&mut self) -> JdwpResult<VmCapabilities> {
        Ok(self.state.lock().unwrap().caps)
    }

    async fn all_threads(&mut self) -> JdwpResult<Vec<ThreadId>> {
        let mut s = self.state.lock().unwrap();
        s.hit("all_threads");
        Ok(s.threads.clone())
    }

    async fn all_classes(&mut self) -> JdwpResult<Vec<LoadedClass>> {
        let mut s = self.state.lock().unwrap();
        s.hit("all_classes");
        Ok(s.classes.clone())
    }

    async fn suspend_all(&mut self) -> JdwpResult<()> {
        self.state.lock().unwrap().hit("suspend_all");
        Ok(())
    }

    async fn resume_all(&mut self) -> JdwpResult<()> {
        self.state.lock().unwrap().hit("resume_all");
        Ok(())
    }

    async fn dispose(&mut self) -> JdwpResult<()> {
        self.state.lock().unwrap().hit("dispose");
        Ok(())
    }

    async fn type_signature(&mut self, type_id: ReferenceTypeId) -> JdwpResult<String> {
        let s = self.state.lock().unwrap();
        s.signatures
            .get(&type_id)
            .cloned()
            .ok_or(JdwpError::Command(ErrorCode::InvalidObject))
    }

    async fn type_class_loader(&mut self, type_id: ReferenceTypeId) -> JdwpResult<ClassLoaderId> {
        let s = self.state.lock().unwrap();
        Ok(s.loaders.get(&type_id).copied().unwrap_or(0))
    }

    async fn type_methods(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>> {
        let mut s = self.state.lock().unwrap();
        s.hit("type_methods");
        Ok(s.methods.get(&type_id).cloned().unwrap_or_default())
    }

    async fn nested_types(&mut self, type_id: ReferenceTypeId) -> JdwpResult<Vec<NestedType>> {
        let mut s = self.state.lock().unwrap();
        s.hit("nested_types");
        Ok(s.nested.get(&type_id).cloned().unwrap_or_default())
    }

    async fn variable_table(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<VariableTable> {
        let s = self.state.lock().unwrap();
        s.tables
            .get(&(type_id, method_id))
            .cloned()
            .ok_or(JdwpError::Command(ErrorCode::AbsentInformation))
    }

    async fn bytecodes(
        &mut self,
        type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Vec<u8>> {
        let mut s = self.state.lock().unwrap();
        s.hit("bytecodes");
        s.bytecode
            .get(&(type_id, method_id))
            .cloned()
            .ok_or(JdwpError::Command(ErrorCode::AbsentInformation))
    }

    async fn thread_name(&mut self, thread: ThreadId) -> JdwpResult<String> {
        let mut s = self.state.lock().unwrap();
        s.hit("thread_name");
        Ok(s.names
            .get(&thread)
            .cloned()
            .unwrap_or_else(|| format!("thread-{thread}")))
    }

    async fn thread_status(
        &mut self,
        thread: ThreadId,
    ) -> JdwpResult<(ThreadStatus, SuspendStatus)> {
        let s = self.state.lock().unwrap();
        let suspend = if s.running.contains(&thread) {
            SuspendStatus::Running
        } else {
            SuspendStatus::Suspended
        };
        Ok((ThreadStatus::Running, suspend))
    }

    async fn thread_group_of(&mut self, thread: ThreadId) -> JdwpResult<ThreadGroupId> {
        let s = self.state.lock().unwrap();
        Ok(s.groups.get(&thread).copied().unwrap_or(0))
    }

    async fn thread_is_virtual(&mut self, thread: ThreadId) -> JdwpResult<bool> {
        let s = self.state.lock().unwrap();
        Ok(s.virtuals.contains(&thread))
    }

    async fn frames(
        &mut self,
        thread: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<FrameInfo>> {
        let mut s = self.state.lock().unwrap();
        s.frames_requests.push((start_frame, length));
        let all = s.frames.get(&thread).cloned().unwrap_or_default();
        let start = start_frame.max(0) as usize;
        let end = if length < 0 {
            all.len()
        } else {
            (start + length as usize).min(all.len())
        };
        Ok(all.get(start..end).map(|s| s.to_vec()).unwrap_or_default())
    }

    async fn frame_count(&mut self, thread: ThreadId) -> JdwpResult<i32> {
        let s = self.state.lock().unwrap();
        if s.frame_count_wrong_state.contains(&thread) {
            return Err(JdwpError::Command(ErrorCode::ThreadNotSuspended));
        }
        Ok(s.frames.get(&thread).map(|f| f.len() as i32).unwrap_or(0))
    }

    async fn thread_group_name(&mut self, group: ThreadGroupId) -> JdwpResult<String> {
        let mut s = self.state.lock().unwrap();
        s.hit("thread_group_name");
        Ok(s.group_names
            .get(&group)
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }

    async fn thread_group_parent(&mut self, _group: ThreadGroupId) -> JdwpResult<ThreadGroupId> {
        Ok(0)
    }

    async fn object_reference_type(
        &mut self,
        object: ObjectId,
    ) -> JdwpResult<(u8, ReferenceTypeId)> {
        let mut s = self.state.lock().unwrap();
        s.hit("object_reference_type");
        s.ref_types
            .get(&object)
            .copied()
            .ok_or(JdwpError::Command(ErrorCode::InvalidObject))
    }

    async fn object_is_collected(&mut self, object: ObjectId) -> JdwpResult<bool> {
        let mut s = self.state.lock().unwrap();
        s.hit("object_is_collected");
        Ok(s.collected.contains(&object))
    }

    async fn get_slot_values(
        &mut self,
        _thread: ThreadId,
        frame: FrameId,
        slots: &[jdwp_transport::SlotRequest],
    ) -> JdwpResult<Vec<Value>> {
        let mut s = self.state.lock().unwrap();
        s.hit("get_slot_values");
        if s.stale_frames.contains(&frame) {
            s.rotate();
            return Err(JdwpError::Command(ErrorCode::InvalidFrameId));
        }
        if slots.iter().any(|r| s.poisoned.contains(&(frame, r.slot))) {
            return Err(JdwpError::Command(ErrorCode::InvalidSlot));
        }
        slots
            .iter()
            .map(|r| {
                s.slot_values
                    .get(&(frame, r.slot))
                    .cloned()
                    .ok_or(JdwpError::Command(ErrorCode::InvalidSlot))
            })
            .collect()
    }

    async fn set_slot_value(
        &mut self,
        _thread: ThreadId,
        frame: FrameId,
        slot: i32,
        value: &Value,
    ) -> JdwpResult<()> {
        let mut s = self.state.lock().unwrap();
        if s.stale_frames.contains(&frame) {
            s.rotate();
            return Err(JdwpError::Command(ErrorCode::InvalidFrameId));
        }
        s.slot_values.insert((frame, slot), value.clone());
        Ok(())
    }

    async fn frame_this_object(&mut self, _thread: ThreadId, frame: FrameId) -> JdwpResult<Value> {
        let mut s = self.state.lock().unwrap();
        s.hit("frame_this_object");
        if s.stale_frames.contains(&frame) {
            s.rotate();
            return Err(JdwpError::Command(ErrorCode::InvalidFrameId));
        }
        Ok(s.this_objects.get(&frame).cloned().unwrap_or(Value::null()))
    }
}

fn bytecode_capable() -> VmCapabilities {
    VmCapabilities {
        can_get_bytecodes: true,
        can_get_constant_pool: true,
        ..Default::default()
    }
}

fn base_state() -> MockState {
    let mut state = MockState {
        caps: bytecode_capable(),
        threads: vec![THREAD],
        ..Default::default()
    };
    state.names.insert(THREAD, "worker".to_string());
    state
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn session(state: MockState) -> (SessionProxy<MockClient>, MockClient) {
    init_tracing();
    let client = MockClient::new(state);
    let mut session = SessionProxy::new(client.clone())
        .await
        .unwrap_or_else(|e| panic!("session setup failed: {e}"));
    // Prime the registry the way a debugger UI would
    session
        .all_threads()
        .await
        .unwrap_or_else(|e| panic!("enumeration failed: {e}"));
    (session, client)
}

#[tokio::test]
async fn thread_proxy_identity_survives_reenumeration() {
    let (mut session, client) = session(base_state()).await;

    session.all_threads().await.unwrap();
    let first = session.cached_thread(THREAD).unwrap() as *const ThreadProxy;

    // Same clock generation: the second lookup must reuse the entry and
    // the cached name
    session.thread_name(THREAD).await.unwrap();
    session.thread_name(THREAD).await.unwrap();
    session.all_threads().await.unwrap();
    let second = session.cached_thread(THREAD).unwrap() as *const ThreadProxy;

    assert_eq!(first, second);
    assert_eq!(client.calls("thread_name"), 1);
    // Clean enumeration cache: one wire round trip
    assert_eq!(client.calls("all_threads"), 1);
}

#[tokio::test]
async fn resume_without_suspend_is_rejected() {
    let (mut session, client) = session(base_state()).await;

    session.suspend().await.unwrap();
    assert_eq!(session.suspend_count(), 1);
    session.resume().await.unwrap();

    match session.resume().await {
        Err(ProxyError::DoubleResume) => {}
        other => panic!("expected DoubleResume, got {other:?}"),
    }
    // The rejected resume never reached the wire
    assert_eq!(client.calls("resume_all"), 1);
}

#[tokio::test]
async fn poisoned_slot_is_isolated_within_batch() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 10)]);
    state.methods.insert(
        CLASS,
        vec![MethodInfo {
            method_id: METH,
            name: "work".to_string(),
            signature: "(I)V".to_string(),
            mod_bits: ACC_STATIC,
        }],
    );
    // istore_1, istore_2, istore_3, istore 4: four int locals above the
    // single int parameter in slot 0
    state
        .bytecode
        .insert((CLASS, METH), vec![0x3c, 0x3d, 0x3e, 0x36, 0x04]);
    for slot in [0, 1, 3, 4] {
        state.slot_values.insert((100, slot), int_value(slot * 10));
    }
    state.poisoned.insert((100, 2));

    let (mut session, _client) = session(state).await;
    assert_eq!(session.fetch_path(), ValueFetchPath::BytecodeRecovery);

    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();
    let values = session.frame_variables(frame, FetchMode::Full).await.unwrap();

    assert_eq!(values.len(), 5);
    for (i, vv) in values.iter().enumerate() {
        assert_eq!(vv.descriptor.slot, i as u32);
        match (&vv.value, i) {
            (SlotValue::Corrupted(code), 2) => assert_eq!(*code, ErrorCode::InvalidSlot),
            (SlotValue::Value(v), _) => assert_eq!(v, &int_value(i as i32 * 10)),
            (other, _) => panic!("slot {i}: unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn stale_frame_is_retried_once_and_succeeds() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 0)]);
    state.stale_frames.insert(100);
    state.rotated = Some((THREAD, vec![frame_info(200, 0)]));
    state.this_objects.insert(
        200,
        Value {
            tag: tags::OBJECT,
            data: ValueData::Object(0x42),
        },
    );

    let (mut session, client) = session(state).await;

    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();
    let this = session.frame_this_object(frame).await.unwrap();

    assert_eq!(this.data, ValueData::Object(0x42));
    // First call hit the stale id, the retry hit the rotated one
    assert_eq!(client.calls("frame_this_object"), 2);
}

#[tokio::test]
async fn stale_frame_on_running_thread_is_not_retried() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 0)]);
    state.stale_frames.insert(100);

    let (mut session, client) = session(state).await;
    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();

    // Thread starts running between materialization and the call
    client.state.lock().unwrap().running.insert(THREAD);

    match session.frame_this_object(frame).await {
        Err(ProxyError::ThreadNotSuspended(id)) => assert_eq!(id, THREAD),
        other => panic!("expected ThreadNotSuspended, got {other:?}"),
    }
    assert_eq!(client.calls("frame_this_object"), 1);
}

#[tokio::test]
async fn virtual_threads_are_reported_but_not_cached() {
    let mut state = base_state();
    state.threads = vec![1, 2];
    state.virtuals.insert(2);

    let (mut session, _client) = session(state).await;
    let threads = session.all_threads().await.unwrap();

    assert_eq!(threads, vec![1, 2]);
    assert!(session.cached_thread(1).is_some());
    assert!(session.cached_thread(2).is_none());
}

#[tokio::test]
async fn nested_types_keeps_direct_children_only() {
    let mut state = base_state();
    state.signatures.insert(10, "Lcom/app/Outer;".to_string());
    state.signatures.insert(11, "Lcom/app/Outer$Inner;".to_string());
    state
        .signatures
        .insert(12, "Lcom/app/Outer$Inner$Deep;".to_string());
    state.signatures.insert(13, "Lcom/app/OuterX;".to_string());
    state.signatures.insert(14, "Lcom/app/Outer$Foreign;".to_string());
    for id in [10u64, 11, 12, 13] {
        state.loaders.insert(id, 7);
    }
    state.loaders.insert(14, 8); // different defining loader
    state.nested.insert(
        10,
        [11u64, 12, 13, 14]
            .into_iter()
            .map(|type_id| NestedType {
                ref_type_tag: 1,
                type_id,
            })
            .collect(),
    );

    let (mut session, client) = session(state).await;

    let direct = session.nested_types(10).await.unwrap();
    assert_eq!(direct, vec![11]);

    // Cached per declaring type
    session.nested_types(10).await.unwrap();
    assert_eq!(client.calls("nested_types"), 1);
}

#[tokio::test]
async fn fast_mode_fetches_parameters_only() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 10)]);
    state.methods.insert(
        CLASS,
        vec![MethodInfo {
            method_id: METH,
            name: "work".to_string(),
            signature: "(I)V".to_string(),
            mod_bits: ACC_STATIC,
        }],
    );
    state.bytecode.insert((CLASS, METH), vec![0x3c]);
    state.slot_values.insert((100, 0), int_value(7));
    state.slot_values.insert((100, 1), int_value(8));

    let (mut session, client) = session(state).await;
    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();

    let fast = session.frame_variables(frame, FetchMode::Fast).await.unwrap();
    assert_eq!(fast.len(), 1);
    assert!(fast[0].descriptor.is_param);
    assert_eq!(client.calls("bytecodes"), 0);

    let full = session.frame_variables(frame, FetchMode::Full).await.unwrap();
    assert_eq!(full.len(), 2);
    assert_eq!(client.calls("bytecodes"), 1);
}

#[tokio::test]
async fn frame_list_extends_by_delta_and_keeps_bottom_indices() {
    let mut state = base_state();
    state
        .frames
        .insert(THREAD, vec![frame_info(100, 5), frame_info(101, 50)]);

    let (mut session, client) = session(state).await;

    let first = session.thread_frames(THREAD).await.unwrap();
    assert_eq!(
        first.iter().map(|f| f.index_from_bottom).collect::<Vec<_>>(),
        vec![2, 1]
    );

    // Invalidate, then the target pushes one more frame
    session.suspend().await.unwrap();
    client.state.lock().unwrap().frames.insert(
        THREAD,
        vec![frame_info(99, 0), frame_info(100, 5), frame_info(101, 50)],
    );

    let second = session.thread_frames(THREAD).await.unwrap();
    assert_eq!(
        second.iter().map(|f| f.index_from_bottom).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    // The bottom frame kept its handle and still resolves to the same
    // location
    let bottom = second[2];
    assert_eq!(bottom, first[1]);
    let location = session.frame_location(bottom).await.unwrap();
    assert_eq!(location.index, 50);

    // Initial full fetch, then only the one missing frame, then the
    // materialization window
    let requests = client.state.lock().unwrap().frames_requests.clone();
    assert_eq!(requests, vec![(0, 2), (0, 1), (0, 3)]);
}

#[tokio::test]
async fn frame_count_is_zero_when_vm_contradicts_itself() {
    let mut state = base_state();
    state.frame_count_wrong_state.insert(THREAD);

    let (mut session, _client) = session(state).await;
    // The count command says "not suspended", the status command says
    // suspended: report an empty stack rather than an error
    assert_eq!(session.thread_frame_count(THREAD).await.unwrap(), 0);
}

#[tokio::test]
async fn force_frames_requests_the_whole_stack() {
    let mut state = base_state();
    state
        .frames
        .insert(THREAD, vec![frame_info(100, 5), frame_info(101, 50)]);

    let (mut session, client) = session(state).await;
    session.thread_frames(THREAD).await.unwrap();
    let forced = session.force_thread_frames(THREAD).await.unwrap();

    assert_eq!(forced.len(), 2);
    let requests = client.state.lock().unwrap().frames_requests.clone();
    assert_eq!(requests, vec![(0, 2), (0, -1)]);
}

#[tokio::test]
async fn collected_is_terminal_across_invalidation() {
    let mut state = base_state();
    state.ref_types.insert(0x42, (1, CLASS));

    let (mut session, client) = session(state).await;

    assert!(!session.object_is_collected(0x42).await.unwrap());

    // Object dies; invalidation lets the proxy notice
    session.suspend().await.unwrap();
    client.state.lock().unwrap().collected.insert(0x42);
    assert!(session.object_is_collected(0x42).await.unwrap());

    // Terminal: further invalidation never re-asks the VM
    session.resume().await.unwrap();
    assert!(session.object_is_collected(0x42).await.unwrap());
    assert_eq!(client.calls("object_is_collected"), 2);

    match session.object_reference_type(0x42).await {
        Err(ProxyError::ObjectCollected(id)) => assert_eq!(id, 0x42),
        other => panic!("expected ObjectCollected, got {other:?}"),
    }
}

#[tokio::test]
async fn disposed_session_rejects_operations() {
    let (mut session, client) = session(base_state()).await;

    session.dispose().await.unwrap();
    session.dispose().await.unwrap();
    assert_eq!(client.calls("dispose"), 1);

    match session.all_threads().await {
        Err(ProxyError::Disposed) => {}
        other => panic!("expected Disposed, got {other:?}"),
    }
}

#[tokio::test]
async fn degraded_path_uses_the_variable_table() {
    let mut state = base_state();
    state.caps = VmCapabilities::default();
    state.frames.insert(THREAD, vec![frame_info(100, 10)]);
    state.methods.insert(
        CLASS,
        vec![MethodInfo {
            method_id: METH,
            name: "work".to_string(),
            signature: "(I)V".to_string(),
            mod_bits: ACC_STATIC,
        }],
    );
    state.tables.insert(
        (CLASS, METH),
        VariableTable {
            arg_count: 1,
            variables: vec![
                Variable {
                    code_index: 0,
                    name: "x".to_string(),
                    signature: "I".to_string(),
                    length: 100,
                    slot: 0,
                },
                Variable {
                    code_index: 0,
                    name: "count".to_string(),
                    signature: "J".to_string(),
                    length: 100,
                    slot: 1,
                },
            ],
        },
    );
    state.slot_values.insert((100, 0), int_value(7));
    state.slot_values.insert(
        (100, 1),
        Value {
            tag: tags::LONG,
            data: ValueData::Long(9),
        },
    );

    let (mut session, client) = session(state).await;
    assert_eq!(session.fetch_path(), ValueFetchPath::VariableTableOnly);

    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();
    let values = session.frame_variables(frame, FetchMode::Full).await.unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values[1].descriptor.slot, 1);
    assert_eq!(values[1].descriptor.sig, Some(b'J'));
    assert!(values[1].descriptor.names.contains("count"));
    assert_eq!(client.calls("bytecodes"), 0);
}

#[tokio::test]
async fn supplied_name_table_overrides_the_symbolic_one() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 10)]);
    state.methods.insert(
        CLASS,
        vec![MethodInfo {
            method_id: METH,
            name: "work".to_string(),
            signature: "()V".to_string(),
            mod_bits: ACC_STATIC,
        }],
    );
    state.bytecode.insert((CLASS, METH), vec![0x3b]); // istore_0
    state.slot_values.insert((100, 0), int_value(5));

    let (mut session, _client) = session(state).await;
    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();

    let mut names = jdwp_proxy::SlotNameTable::new();
    names.add(0, "counter");
    let values = session
        .frame_variables_named(frame, FetchMode::Full, &names)
        .await
        .unwrap();

    assert_eq!(values.len(), 1);
    assert!(values[0].descriptor.names.contains("counter"));
}

#[tokio::test]
async fn forced_registration_caches_a_virtual_thread() {
    let mut state = base_state();
    state.threads = vec![1, 2];
    state.virtuals.insert(2);

    let (mut session, _client) = session(state).await;
    assert!(session.cached_thread(2).is_none());

    let virtual_flag = session.force_thread_proxy(2).await.unwrap().is_virtual();
    assert!(virtual_flag);
    assert!(session.cached_thread(2).is_some());
}

#[tokio::test]
async fn forced_virtual_thread_survives_reenumeration() {
    let mut state = base_state();
    state.virtuals.insert(2); // not in the AllThreads reply

    let (mut session, _client) = session(state).await;
    session.force_thread_proxy(2).await.unwrap();

    // Dirty rescan: AllThreads reports platform threads only, so the
    // forced entry must not be treated as dead
    session.suspend().await.unwrap();
    let threads = session.all_threads().await.unwrap();

    assert_eq!(threads, vec![THREAD]);
    let kept = session.cached_thread(2).unwrap_or_else(|| {
        panic!("forced virtual thread evicted by enumeration")
    });
    assert!(kept.is_virtual());
    assert!(session.cached_thread(THREAD).is_some());
}

#[tokio::test]
async fn clear_caches_evicts_collected_objects() {
    let mut state = base_state();
    state.collected.insert(0x42);

    let (mut session, client) = session(state).await;

    assert!(session.object_is_collected(0x42).await.unwrap());
    // Terminal while the entry lives: no re-ask
    assert!(session.object_is_collected(0x42).await.unwrap());
    assert_eq!(client.calls("object_is_collected"), 1);

    // The full cache drop also releases the dead entry, so the next
    // query rebuilds it over the wire
    session.clear_caches();
    assert!(session.object_is_collected(0x42).await.unwrap());
    assert_eq!(client.calls("object_is_collected"), 2);
}

#[tokio::test]
async fn all_classes_is_fetched_once_until_redefinition() {
    let mut state = base_state();
    state.classes = vec![LoadedClass {
        ref_type_tag: 1,
        type_id: CLASS,
        signature: "Lcom/app/Outer;".to_string(),
        status: 7,
    }];

    let (mut session, client) = session(state).await;

    assert_eq!(session.all_classes().await.unwrap().len(), 1);
    session.all_classes().await.unwrap();
    assert_eq!(client.calls("all_classes"), 1);

    // Redefinition drops the cached list; the next query refetches
    session.class_redefined();
    let classes = session.all_classes().await.unwrap();
    assert_eq!(classes[0].type_id, CLASS);
    assert_eq!(client.calls("all_classes"), 2);
}

#[tokio::test]
async fn bytecode_fetch_requires_the_capability() {
    let mut state = base_state();
    state.caps = VmCapabilities::default();

    let (mut session, _client) = session(state).await;
    match session.method_bytecodes(CLASS, METH).await {
        Err(ProxyError::UnsupportedCapability(flag)) => assert_eq!(flag, "canGetBytecodes"),
        other => panic!("expected UnsupportedCapability, got {other:?}"),
    }
}

#[tokio::test]
async fn set_variable_drops_cached_values() {
    let mut state = base_state();
    state.frames.insert(THREAD, vec![frame_info(100, 10)]);
    state.methods.insert(
        CLASS,
        vec![MethodInfo {
            method_id: METH,
            name: "work".to_string(),
            signature: "(I)V".to_string(),
            mod_bits: ACC_STATIC,
        }],
    );
    state.bytecode.insert((CLASS, METH), Vec::new());
    state.slot_values.insert((100, 0), int_value(7));

    let (mut session, client) = session(state).await;
    let frame = session.thread_frame(THREAD, 0).await.unwrap().unwrap();

    let before = session.frame_variables(frame, FetchMode::Full).await.unwrap();
    assert_eq!(before[0].value, SlotValue::Value(int_value(7)));

    session.set_frame_variable(frame, 0, &int_value(99)).await.unwrap();
    let after = session.frame_variables(frame, FetchMode::Full).await.unwrap();

    assert_eq!(after[0].value, SlotValue::Value(int_value(99)));
    assert_eq!(client.calls("get_slot_values"), 2);
}
