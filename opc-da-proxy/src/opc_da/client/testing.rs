//! In-process remote objects for exercising the proxies without a server.
//!
//! [`ScriptedTransport`] replays hand-built NDR responses in order and
//! records every request, so tests can check wire layouts byte for byte.
//! [`FakeAddressSpace`] and [`FakeEnumString`] answer browse and
//! enumeration calls from an in-memory tree.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use crate::opc_da::errors::codes;
use crate::opc_da::iid::{IID_IENUM_STRING, IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE, IID_IUNKNOWN};
use crate::opc_da::ndr::{NdrReader, NdrWriter};
use crate::transport::{CallRequest, CallResponse, RemoteObject, RemoteRef, TransportError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Closes a response body with its status word.
pub fn finish(mut body: NdrWriter, status: u32) -> Vec<u8> {
    body.write_u32(status);
    body.into_bytes()
}

/// Writes a non-null `MInterfacePointer` with a placeholder OBJREF.
pub fn write_interface_pointer(w: &mut NdrWriter) {
    const OBJREF: [u8; 4] = *b"MEOW";
    w.write_referent(true);
    w.write_u32(OBJREF.len() as u32);
    w.write_u32(OBJREF.len() as u32);
    w.write_bytes(&OBJREF);
}

/// One request seen by a scripted object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub iid: Uuid,
    pub opnum: u16,
    pub stub_data: Vec<u8>,
}

impl RecordedCall {
    pub fn reader(&self) -> NdrReader {
        NdrReader::new(self.stub_data.clone())
    }
}

enum Scripted {
    Respond { stub_data: Vec<u8>, interfaces: Vec<Uuid> },
    Hand(RemoteRef, Vec<u8>),
}

#[derive(Default)]
struct Script {
    responses: VecDeque<Scripted>,
    calls: Vec<RecordedCall>,
    queried: Vec<Uuid>,
    released: Vec<Uuid>,
    refused: HashSet<Uuid>,
}

/// Shared script behind every object it hands out.
///
/// Responses are consumed in order by whichever object is called next.
/// `QueryInterface` succeeds for every iid not refused and returns another
/// object on the same script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `IUnknown` of the scripted server.
    pub fn root(&self) -> RemoteRef {
        self.object(IID_IUNKNOWN)
    }

    /// An object already implementing `iid`.
    pub fn object(&self, iid: Uuid) -> RemoteRef {
        Arc::new(ScriptedObject {
            iid,
            transport: self.clone(),
        })
    }

    /// Queues a response with the given out parameters and status.
    pub fn respond(&self, body: NdrWriter, status: u32) {
        self.respond_with_interfaces(body, status, &[]);
    }

    /// Queues a response carrying no out parameters.
    pub fn respond_status(&self, status: u32) {
        self.respond(NdrWriter::new(), status);
    }

    /// Queues a response whose interface pointers resolve to new scripted
    /// objects implementing `iids`, in order.
    pub fn respond_with_interfaces(&self, body: NdrWriter, status: u32, iids: &[Uuid]) {
        lock(&self.script).responses.push_back(Scripted::Respond {
            stub_data: finish(body, status),
            interfaces: iids.to_vec(),
        });
    }

    /// Queues a response whose single interface pointer resolves to
    /// `remote`.
    pub fn respond_with_remote(&self, body: NdrWriter, status: u32, remote: RemoteRef) {
        lock(&self.script)
            .responses
            .push_back(Scripted::Hand(remote, finish(body, status)));
    }

    /// Makes `QueryInterface` for `iid` fail with `E_NOINTERFACE`.
    pub fn refuse_interface(&self, iid: Uuid) {
        lock(&self.script).refused.insert(iid);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.script).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.script).calls.len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.script).calls.last().cloned()
    }

    pub fn queried(&self) -> Vec<Uuid> {
        lock(&self.script).queried.clone()
    }

    pub fn released(&self) -> Vec<Uuid> {
        lock(&self.script).released.clone()
    }

    pub fn pending_responses(&self) -> usize {
        lock(&self.script).responses.len()
    }
}

struct ScriptedObject {
    iid: Uuid,
    transport: ScriptedTransport,
}

#[async_trait]
impl RemoteObject for ScriptedObject {
    async fn query_interface(&self, iid: Uuid) -> Result<RemoteRef, TransportError> {
        {
            let mut script = lock(&self.transport.script);
            if script.refused.contains(&iid) {
                return Err(TransportError::NoSuchInterface(iid));
            }
            script.queried.push(iid);
        }
        Ok(self.transport.object(iid))
    }

    async fn release(&self) -> Result<(), TransportError> {
        lock(&self.transport.script).released.push(self.iid);
        Ok(())
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, TransportError> {
        let next = {
            let mut script = lock(&self.transport.script);
            script.calls.push(RecordedCall {
                iid: self.iid,
                opnum: request.opnum,
                stub_data: request.stub_data,
            });
            script.responses.pop_front()
        };

        match next {
            Some(Scripted::Respond {
                stub_data,
                interfaces,
            }) => Ok(CallResponse {
                stub_data,
                interfaces: interfaces
                    .into_iter()
                    .map(|iid| self.transport.object(iid))
                    .collect(),
            }),
            Some(Scripted::Hand(remote, stub_data)) => Ok(CallResponse {
                stub_data,
                interfaces: vec![remote],
            }),
            None => Err(anyhow!(
                "no scripted response for opnum {} on {}",
                request.opnum,
                self.iid
            )
            .into()),
        }
    }
}

/// Responds to `IEnumString` calls from a fixed list of names.
#[derive(Clone)]
pub struct FakeEnumString {
    state: Arc<Mutex<EnumState>>,
}

struct EnumState {
    names: Vec<String>,
    cursor: usize,
    next_calls: usize,
    released: bool,
}

impl FakeEnumString {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EnumState {
                names: names.into_iter().map(Into::into).collect(),
                cursor: 0,
                next_calls: 0,
                released: false,
            })),
        }
    }

    pub fn remote(&self) -> RemoteRef {
        Arc::new(self.clone())
    }

    pub fn next_calls(&self) -> usize {
        lock(&self.state).next_calls
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }
}

#[async_trait]
impl RemoteObject for FakeEnumString {
    async fn query_interface(&self, iid: Uuid) -> Result<RemoteRef, TransportError> {
        if iid == IID_IENUM_STRING {
            Ok(self.remote())
        } else {
            Err(TransportError::NoSuchInterface(iid))
        }
    }

    async fn release(&self) -> Result<(), TransportError> {
        lock(&self.state).released = true;
        Ok(())
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, TransportError> {
        let mut params = NdrReader::new(request.stub_data);
        let mut state = lock(&self.state);
        let mut body = NdrWriter::new();

        let status = match request.opnum {
            0 => {
                state.next_calls += 1;
                let requested = params.read_u32().map_err(anyhow::Error::from)? as usize;
                let end = (state.cursor + requested).min(state.names.len());
                let batch = state.names[state.cursor..end].to_vec();
                state.cursor = end;

                body.write_u32(requested as u32);
                body.write_u32(0);
                body.write_u32(batch.len() as u32);
                for _ in &batch {
                    body.write_referent(true);
                }
                for name in &batch {
                    body.write_string(name).map_err(anyhow::Error::from)?;
                }
                body.write_u32(batch.len() as u32);
                if batch.len() < requested {
                    codes::S_FALSE
                } else {
                    codes::S_OK
                }
            }
            1 => {
                let requested = params.read_u32().map_err(anyhow::Error::from)? as usize;
                let target = state.cursor + requested;
                state.cursor = target.min(state.names.len());
                if target > state.names.len() {
                    codes::S_FALSE
                } else {
                    codes::S_OK
                }
            }
            2 => {
                state.cursor = 0;
                codes::S_OK
            }
            opnum => return Err(anyhow!("IEnumString has no method {opnum}").into()),
        };

        Ok(CallResponse {
            stub_data: finish(body, status),
            interfaces: Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf,
    Branch(BTreeMap<String, Node>),
}

struct AddressState {
    root: BTreeMap<String, Node>,
    position: Vec<String>,
    fail_under: Option<String>,
    calls: Vec<u16>,
}

impl AddressState {
    fn current(&self) -> Option<&BTreeMap<String, Node>> {
        let mut level = &self.root;
        for name in &self.position {
            match level.get(name) {
                Some(Node::Branch(children)) => level = children,
                _ => return None,
            }
        }
        Some(level)
    }

    fn qualify(&self, name: &str) -> String {
        self.position
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn flat_ids(prefix: &str, level: &BTreeMap<String, Node>, out: &mut Vec<String>) {
    for (name, node) in level {
        let id = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match node {
            Node::Leaf => out.push(id),
            Node::Branch(children) => flat_ids(&id, children, out),
        }
    }
}

/// A hierarchical namespace answering `IOPCBrowseServerAddressSpace`.
///
/// Item IDs are the dot-joined path. `BrowseAccessPaths` is not
/// implemented, as on most servers.
#[derive(Clone)]
pub struct FakeAddressSpace {
    state: Arc<Mutex<AddressState>>,
}

impl Default for FakeAddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAddressSpace {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AddressState {
                root: BTreeMap::new(),
                position: Vec::new(),
                fail_under: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Adds a leaf at a dot-separated path, creating branches on the way.
    pub fn with_leaf(self, path: &str) -> Self {
        self.insert(path, Node::Leaf);
        self
    }

    /// Adds an empty branch at a dot-separated path.
    pub fn with_branch(self, path: &str) -> Self {
        self.insert(path, Node::Branch(BTreeMap::new()));
        self
    }

    /// Fails every browse issued while the cursor is at or below `path`.
    pub fn failing_under(self, path: &str) -> Self {
        lock(&self.state).fail_under = Some(path.to_string());
        self
    }

    fn insert(&self, path: &str, node: Node) {
        let mut state = lock(&self.state);
        let mut parts: Vec<&str> = path.split('.').collect();
        let Some(last) = parts.pop() else {
            return;
        };
        let mut level = &mut state.root;
        for part in parts {
            let entry = level
                .entry(part.to_string())
                .or_insert_with(|| Node::Branch(BTreeMap::new()));
            if let Node::Leaf = entry {
                *entry = Node::Branch(BTreeMap::new());
            }
            let Node::Branch(children) = entry else {
                return;
            };
            level = children;
        }
        level.entry(last.to_string()).or_insert(node);
    }

    pub fn remote(&self) -> RemoteRef {
        Arc::new(self.clone())
    }

    /// Current cursor, dot-joined; empty at the root.
    pub fn position(&self) -> String {
        lock(&self.state).position.join(".")
    }

    /// Opnums of every call received, in order.
    pub fn calls(&self) -> Vec<u16> {
        lock(&self.state).calls.clone()
    }

    fn handle(&self, opnum: u16, stub_data: Vec<u8>) -> anyhow::Result<CallResponse> {
        let mut params = NdrReader::new(stub_data);
        let mut state = lock(&self.state);
        state.calls.push(opnum);
        let mut body = NdrWriter::new();
        let mut interfaces = Vec::new();

        let status = match opnum {
            0 => {
                body.write_enum16(1);
                codes::S_OK
            }
            1 => {
                let direction = params.read_enum16()?;
                let name = params.read_string()?;
                match direction {
                    1 if state.position.is_empty() => codes::E_FAIL,
                    1 => {
                        state.position.pop();
                        codes::S_OK
                    }
                    2 => {
                        let is_branch = matches!(
                            state.current().and_then(|level| level.get(&name)),
                            Some(Node::Branch(_))
                        );
                        if is_branch {
                            state.position.push(name);
                            codes::S_OK
                        } else {
                            codes::E_INVALIDARG
                        }
                    }
                    3 if name.is_empty() => {
                        state.position.clear();
                        codes::S_OK
                    }
                    3 => {
                        let previous = std::mem::take(&mut state.position);
                        state.position = name.split('.').map(str::to_string).collect();
                        if state.current().is_some() {
                            codes::S_OK
                        } else {
                            state.position = previous;
                            codes::E_INVALIDARG
                        }
                    }
                    _ => codes::E_INVALIDARG,
                }
            }
            2 => {
                let browse_type = params.read_enum16()?;
                let _filter = params.read_string()?;
                let position = state.position.join(".");
                let failing = state.fail_under.as_deref().is_some_and(|prefix| {
                    position == prefix || position.starts_with(&format!("{prefix}."))
                });
                if failing {
                    codes::E_FAIL
                } else {
                    let level = state.current().cloned().unwrap_or_default();
                    let names: Vec<String> = match browse_type {
                        1 => level
                            .iter()
                            .filter(|(_, node)| matches!(node, Node::Branch(_)))
                            .map(|(name, _)| name.clone())
                            .collect(),
                        2 => level
                            .iter()
                            .filter(|(_, node)| matches!(node, Node::Leaf))
                            .map(|(name, _)| name.clone())
                            .collect(),
                        _ => {
                            let mut out = Vec::new();
                            flat_ids(&position, &level, &mut out);
                            out
                        }
                    };
                    if names.is_empty() {
                        body.write_referent(false);
                        codes::S_FALSE
                    } else {
                        write_interface_pointer(&mut body);
                        interfaces.push(FakeEnumString::new(names).remote());
                        codes::S_OK
                    }
                }
            }
            3 => {
                let name = params.read_string()?;
                let id = state.qualify(&name);
                body.write_unique_string(Some(id.as_str()))?;
                codes::S_OK
            }
            4 => codes::E_NOTIMPL,
            opnum => return Err(anyhow!("IOPCBrowseServerAddressSpace has no method {opnum}")),
        };

        body.write_u32(status);
        Ok(CallResponse {
            stub_data: body.into_bytes(),
            interfaces,
        })
    }
}

#[async_trait]
impl RemoteObject for FakeAddressSpace {
    async fn query_interface(&self, iid: Uuid) -> Result<RemoteRef, TransportError> {
        if iid == IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE {
            Ok(self.remote())
        } else {
            Err(TransportError::NoSuchInterface(iid))
        }
    }

    async fn release(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, TransportError> {
        Ok(self.handle(request.opnum, request.stub_data)?)
    }
}
