//! Control-plane wire types for gamemaster
//!
//! This crate holds the request/response vocabulary shared by the server and
//! the `Clerk` client stub, plus the length-prefixed framing used on the wire.

use serde::{Deserialize, Serialize};

pub mod codec;

pub use codec::{
    MAX_FRAME_LEN, ProtoError, encode_frame, read_frame, write_encoded, write_frame,
};

/// Prefix prepended to every echoed message
pub const ECHO_PREFIX: &str = "This is your message: ";

// ============================================================================
// Requests and Responses
// ============================================================================

/// Operations a remote caller can invoke on the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Start operating the game at `resource_id`
    Attach { resource_id: String },
    /// Stop operating the game at `resource_id`
    Detach { resource_id: String },
    /// Liveness check for the transport
    Echo { message: String },
    /// Snapshot of every operated game
    List,
}

impl Request {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::Attach { .. } => "attach",
            Request::Detach { .. } => "detach",
            Request::Echo { .. } => "echo",
            Request::List => "list",
        }
    }
}

/// Successful replies, one per `Request` variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    Attached,
    Detached,
    Echoed { echoed: String },
    Operated { resources: Vec<ResourceStatus> },
}

/// Per-worker statistics reported by `Request::List`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub resource_id: String,
    /// Number of ticks the worker has run
    pub ticks: u64,
    /// Number of forcing actions that were accepted by the chain
    pub forced: u64,
    /// Number of ticks abandoned because of an external failure
    pub failures: u64,
    /// Last state observed on chain, if any tick got that far
    pub last_state: Option<String>,
}

// ============================================================================
// Faults
// ============================================================================

/// Category of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    AlreadyOperated,
    NotOperated,
    EmptyMessage,
    ShuttingDown,
    CancelTimedOut,
    BadRequest,
    /// The operation ran, but its reply would not fit in one frame
    ReplyTooLarge,
}

/// Error reply carried over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    /// Resource the fault is about, for the kinds that name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource_id: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Frame sent by a client. `id` is echoed back in the matching `ReplyFrame`
/// so several requests can be in flight on one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub request: Request,
}

/// Frame sent by the server in answer to a `RequestFrame`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub id: u64,
    pub outcome: Result<Response, Fault>,
}

impl ReplyFrame {
    pub fn ok(id: u64, response: Response) -> Self {
        Self {
            id,
            outcome: Ok(response),
        }
    }

    pub fn fault(id: u64, fault: Fault) -> Self {
        Self {
            id,
            outcome: Err(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let frame = RequestFrame {
            id: 7,
            request: Request::Attach {
                resource_id: "0x1".to_string(),
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["request"]["op"], "attach");
        assert_eq!(json["request"]["resource_id"], "0x1");
    }

    #[test]
    fn test_fault_reply_shape() {
        let reply = ReplyFrame::fault(3, Fault::new(FaultKind::NotOperated, "game at 0x9 not operated"));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["outcome"]["Err"]["kind"], "not_operated");

        let decoded: ReplyFrame = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn test_request_names() {
        assert_eq!(Request::List.name(), "list");
        assert_eq!(
            Request::Echo {
                message: String::new()
            }
            .name(),
            "echo"
        );
    }
}
