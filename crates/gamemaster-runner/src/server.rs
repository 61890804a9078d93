//! Control-plane server.
//!
//! One task accepts connections; every connection gets a reader loop and a
//! writer task, and every request runs in its own task so a slow detach does
//! not hold up an echo on the same connection.

use std::net::SocketAddr;
use std::sync::Arc;

use gamemaster_chain::{AuthContext, ChainClient, JsonRpcClient, ResourceId, SimulatedChain};
use gamemaster_protocol::{
    Fault, FaultKind, ProtoError, ReplyFrame, Request, RequestFrame, Response, encode_frame,
    read_frame, write_encoded,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::GamemasterConfig;
use crate::error::StartupError;
use crate::registry::{OperatorContext, Registry};

/// Replies buffered per connection before request tasks wait on the writer
const REPLY_QUEUE_DEPTH: usize = 32;

pub struct Server {
    registry: Arc<Registry>,
    local_addr: SocketAddr,
    accept_task: Option<JoinHandle<()>>,
    /// Flipped to true to drop the listener and every open connection
    stop_tx: watch::Sender<bool>,
}

impl Server {
    /// Build the registry and start listening.
    ///
    /// In debug mode games are operated against an in-memory chain and no
    /// operator account is needed. Otherwise the configured account must
    /// parse and the JSON-RPC client must build.
    pub async fn start(config: &GamemasterConfig) -> Result<Self, StartupError> {
        if config.server.debug {
            info!(target: "net", "debug mode: operating games on a simulated chain");
            return Self::start_with_client(config, Arc::new(SimulatedChain::new()), None).await;
        }

        let credential = config.chain.operator_account.as_deref().unwrap_or_default();
        let auth = AuthContext::from_credential(credential)?;
        let client = JsonRpcClient::new(config.chain.rpc_endpoint.clone()).map_err(|e| {
            StartupError::ChainClient {
                endpoint: config.chain.rpc_endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        Self::start_with_client(config, Arc::new(client), Some(auth)).await
    }

    /// Start with an explicit chain client and auth context
    pub async fn start_with_client(
        config: &GamemasterConfig,
        client: Arc<dyn ChainClient>,
        auth: Option<AuthContext>,
    ) -> Result<Self, StartupError> {
        let addr = config.server.listen_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!(
            target: "net",
            "listening on {} (chain: {}, tick every {:?})",
            local_addr,
            client.describe(),
            config.chain.tick_interval()
        );

        let registry = Arc::new(Registry::new(
            OperatorContext {
                client,
                auth,
                tick_interval: config.chain.tick_interval(),
            },
            config.server.cancel_timeout(),
        ));
        let (stop_tx, _) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, registry.clone(), stop_tx.subscribe()));

        Ok(Self {
            registry,
            local_addr,
            accept_task: Some(accept_task),
            stop_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Tear the registry down, then close the listener and all connections
    pub async fn shutdown(mut self) {
        self.registry.teardown().await;
        self.stop_tx.send_replace(true);
        if let Some(task) = self.accept_task.take()
            && let Err(e) = task.await
        {
            error!(target: "net", "accept loop failed: {}", e);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

async fn accept_loop(listener: TcpListener, registry: Arc<Registry>, mut stop: watch::Receiver<bool>) {
    let mut closed = registry.closed();

    loop {
        tokio::select! {
            _ = flipped(&mut stop) => break,
            _ = flipped(&mut closed) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(target: "net", "connection from {}", peer);
                    tokio::spawn(serve_connection(stream, peer, registry.clone(), stop.clone()));
                }
                Err(e) => {
                    error!(target: "net", "accept error: {}", e);
                    registry.teardown().await;
                    break;
                }
            },
        }
    }

    info!(target: "net", "listener on {:?} closed", listener.local_addr().ok());
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    mut stop: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Vec<u8>>(REPLY_QUEUE_DEPTH);

    // Only encoded frames reach the writer, so it fails on I/O alone
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = reply_rx.recv().await {
            if let Err(e) = write_encoded(&mut writer, &frame).await {
                warn!(target: "net", "{}: write failed: {}", peer, e);
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            _ = flipped(&mut stop) => break,
            frame = read_frame::<_, serde_json::Value>(&mut reader) => frame,
        };

        let value = match frame {
            Ok(value) => value,
            Err(e) if e.is_eof() => {
                debug!(target: "net", "{}: peer closed", peer);
                break;
            }
            Err(ProtoError::Json(e)) => {
                warn!(target: "net", "{}: undecodable frame: {}", peer, e);
                let fault = Fault::new(FaultKind::BadRequest, e.to_string());
                if !send_reply(&reply_tx, peer, ReplyFrame::fault(0, fault)).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(target: "net", "{}: dropping connection: {}", peer, e);
                break;
            }
        };

        // Keep the id of a malformed request so the caller can match the fault
        let id = value.get("id").and_then(serde_json::Value::as_u64).unwrap_or(0);
        let RequestFrame { id, request } = match serde_json::from_value(value) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "net", "{}: bad request {}: {}", peer, id, e);
                let fault = Fault::new(FaultKind::BadRequest, e.to_string());
                if !send_reply(&reply_tx, peer, ReplyFrame::fault(id, fault)).await {
                    break;
                }
                continue;
            }
        };

        let registry = registry.clone();
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            debug!(target: "net", "{}: request {} {}", peer, id, request.name());
            let outcome = dispatch(&registry, request).await;
            // Connection may be gone by now; the operation itself already happened
            send_reply(&reply_tx, peer, ReplyFrame { id, outcome }).await;
        });
    }

    drop(reply_tx);
    if let Err(e) = writer_task.await {
        error!(target: "net", "{}: writer failed: {}", peer, e);
    }
}

/// Queue `reply` for the writer. A reply too large for one frame is swapped
/// for a `ReplyTooLarge` fault with the same id.
///
/// Returns false once the writer is gone.
async fn send_reply(reply_tx: &mpsc::Sender<Vec<u8>>, peer: SocketAddr, reply: ReplyFrame) -> bool {
    let id = reply.id;
    let frame = match encode_frame(&reply) {
        Ok(frame) => frame,
        Err(ProtoError::FrameTooLarge(len)) => {
            warn!(target: "net", "{}: reply {} is {} bytes, sending a fault instead", peer, id, len);
            let fault = Fault::new(
                FaultKind::ReplyTooLarge,
                format!("reply of {len} bytes exceeds the frame limit"),
            );
            match encode_frame(&ReplyFrame::fault(id, fault)) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(target: "net", "{}: failed to encode fault for {}: {}", peer, id, e);
                    return true;
                }
            }
        }
        Err(e) => {
            error!(target: "net", "{}: failed to encode reply {}: {}", peer, id, e);
            return true;
        }
    };
    reply_tx.send(frame).await.is_ok()
}

/// Resolves once the flag is true or its sender is gone
async fn flipped(flag: &mut watch::Receiver<bool>) {
    let _ = flag.wait_for(|set| *set).await;
}

async fn dispatch(registry: &Registry, request: Request) -> Result<Response, Fault> {
    let result = match request {
        Request::Attach { resource_id } => registry
            .attach(ResourceId::from(resource_id))
            .await
            .map(|()| Response::Attached),
        Request::Detach { resource_id } => registry
            .detach(&ResourceId::from(resource_id))
            .await
            .map(|()| Response::Detached),
        Request::Echo { message } => registry
            .echo(&message)
            .map(|echoed| Response::Echoed { echoed }),
        Request::List => registry
            .list()
            .await
            .map(|resources| Response::Operated { resources }),
    };
    result.map_err(|e| e.to_fault())
}
