//! Client stub for the control-plane server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use gamemaster_chain::ResourceId;
use gamemaster_protocol::{
    Fault, ProtoError, ReplyFrame, Request, RequestFrame, ResourceStatus, Response, encode_frame,
    read_frame, write_encoded,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RegistryError;

/// Requests queued for the writer before callers wait
const OUTGOING_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ClerkError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be put on the wire; the connection is unaffected
    #[error("request not sent: {0}")]
    Proto(#[from] ProtoError),

    #[error("connection to server closed")]
    ConnectionClosed,

    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(Response),

    #[error(transparent)]
    Registry(RegistryError),

    /// Fault with no registry counterpart, e.g. a request the server could not decode
    #[error("request rejected: {0}")]
    Rejected(Fault),
}

impl From<Fault> for ClerkError {
    fn from(fault: Fault) -> Self {
        match RegistryError::from_fault(&fault) {
            Some(e) => ClerkError::Registry(e),
            None => ClerkError::Rejected(fault),
        }
    }
}

type Waiter = oneshot::Sender<Result<Response, Fault>>;

#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, Waiter>,
    /// Set once either half of the connection is gone
    closed: bool,
}

struct ClerkInner {
    addr: String,
    next_id: AtomicU64,
    pending: Arc<Mutex<Pending>>,
    /// Encoded request frames
    outgoing: mpsc::Sender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for ClerkInner {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connection to a gamemaster server. Clones share the connection and can
/// issue requests concurrently.
#[derive(Clone)]
pub struct Clerk {
    inner: Arc<ClerkInner>,
}

impl Clerk {
    pub async fn connect(addr: impl Into<String>) -> Result<Self, ClerkError> {
        let addr = addr.into();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ClerkError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();

        let pending = Arc::new(Mutex::new(Pending::default()));
        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let reader = tokio::spawn(read_replies(read_half, pending.clone()));
        let writer = tokio::spawn(write_requests(write_half, outgoing_rx, pending.clone()));

        debug!(target: "net", "clerk connected to {}", addr);
        Ok(Self {
            inner: Arc::new(ClerkInner {
                addr,
                next_id: AtomicU64::new(1),
                pending,
                outgoing,
                reader,
                writer,
            }),
        })
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub async fn attach(&self, resource_id: impl Into<ResourceId>) -> Result<(), ClerkError> {
        let request = Request::Attach {
            resource_id: resource_id.into().into_inner(),
        };
        match self.call(request).await? {
            Response::Attached => Ok(()),
            other => Err(ClerkError::UnexpectedResponse(other)),
        }
    }

    pub async fn detach(&self, resource_id: impl Into<ResourceId>) -> Result<(), ClerkError> {
        let request = Request::Detach {
            resource_id: resource_id.into().into_inner(),
        };
        match self.call(request).await? {
            Response::Detached => Ok(()),
            other => Err(ClerkError::UnexpectedResponse(other)),
        }
    }

    pub async fn echo(&self, message: impl Into<String>) -> Result<String, ClerkError> {
        let request = Request::Echo {
            message: message.into(),
        };
        match self.call(request).await? {
            Response::Echoed { echoed } => Ok(echoed),
            other => Err(ClerkError::UnexpectedResponse(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<ResourceStatus>, ClerkError> {
        match self.call(Request::List).await? {
            Response::Operated { resources } => Ok(resources),
            other => Err(ClerkError::UnexpectedResponse(other)),
        }
    }

    async fn call(&self, request: Request) -> Result<Response, ClerkError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_frame(&RequestFrame { id, request })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = lock(&self.inner.pending);
            if pending.closed {
                return Err(ClerkError::ConnectionClosed);
            }
            pending.waiters.insert(id, reply_tx);
        }

        if self.inner.outgoing.send(frame).await.is_err() {
            lock(&self.inner.pending).waiters.remove(&id);
            return Err(ClerkError::ConnectionClosed);
        }

        match reply_rx.await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => Err(ClerkError::ConnectionClosed),
        }
    }
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fail every outstanding call and refuse new ones
fn close(pending: &Mutex<Pending>) {
    let mut pending = lock(pending);
    pending.closed = true;
    pending.waiters.clear();
}

async fn read_replies(mut reader: OwnedReadHalf, pending: Arc<Mutex<Pending>>) {
    loop {
        match read_frame::<_, ReplyFrame>(&mut reader).await {
            Ok(ReplyFrame { id, outcome }) => {
                let waiter = lock(&pending).waiters.remove(&id);
                match waiter {
                    // Caller may have given up; nothing to do then
                    Some(waiter) => {
                        let _ = waiter.send(outcome);
                    }
                    None => warn!(target: "net", "reply for unknown request {}", id),
                }
            }
            Err(e) if e.is_eof() => {
                debug!(target: "net", "server closed the connection");
                break;
            }
            Err(e) => {
                warn!(target: "net", "failed to read reply: {}", e);
                break;
            }
        }
    }
    close(&pending);
}

async fn write_requests(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::Receiver<Vec<u8>>,
    pending: Arc<Mutex<Pending>>,
) {
    while let Some(frame) = outgoing.recv().await {
        if let Err(e) = write_encoded(&mut writer, &frame).await {
            warn!(target: "net", "failed to send request: {}", e);
            break;
        }
    }
    close(&pending);
}
