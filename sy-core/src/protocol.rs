//! Wire format of the diff/upload API.
//!
//! Diff accepts either a bare JSON array of chunk ids or a JSON-RPC 2.0
//! envelope (`v1/chunks/diff`), and answers in the framing it was asked in.
//! Uploads are raw bytes (`/api/upload/<id>`) or a multipart body whose part
//! names are chunk ids (`/api/upload`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyError};
use crate::id::ChunkId;

pub const DIFF_PATH: &str = "/api/diff";
pub const UPLOAD_PATH: &str = "/api/upload";
pub const DIFF_METHOD: &str = "v1/chunks/diff";
pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    Plain,
    JsonRpc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest<P> {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: P,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse<R> {
    pub jsonrpc: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffParams {
    pub chunks: Vec<ChunkId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub unknown: Vec<ChunkId>,
}

/// Body of an error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A parsed diff request, remembering how it was framed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffRequest {
    Plain(Vec<ChunkId>),
    Rpc { id: String, chunks: Vec<ChunkId> },
}

impl DiffRequest {
    pub fn new(framing: Framing, chunks: Vec<ChunkId>) -> Self {
        match framing {
            Framing::Plain => DiffRequest::Plain(chunks),
            Framing::JsonRpc => DiffRequest::Rpc {
                id: uuid::Uuid::new_v4().to_string(),
                chunks,
            },
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| SyError::Protocol(format!("invalid JSON: {e}")))?;
        match value {
            Value::Array(_) => {
                let chunks = serde_json::from_value(value)
                    .map_err(|e| SyError::Protocol(format!("invalid chunk list: {e}")))?;
                Ok(DiffRequest::Plain(chunks))
            }
            Value::Object(_) => {
                let req: RpcRequest<Value> = serde_json::from_value(value)
                    .map_err(|e| SyError::Protocol(format!("invalid JSON-RPC request: {e}")))?;
                if req.jsonrpc != JSONRPC_VERSION {
                    return Err(SyError::Protocol(format!(
                        "unsupported jsonrpc version {:?}",
                        req.jsonrpc
                    )));
                }
                if req.method != DIFF_METHOD {
                    return Err(SyError::UnsupportedMethod(req.method));
                }
                let params: DiffParams = serde_json::from_value(req.params)
                    .map_err(|e| SyError::Protocol(format!("invalid diff params: {e}")))?;
                Ok(DiffRequest::Rpc {
                    id: req.id,
                    chunks: params.chunks,
                })
            }
            _ => Err(SyError::Protocol(
                "expected a chunk list or a JSON-RPC request".into(),
            )),
        }
    }

    pub fn chunks(&self) -> &[ChunkId] {
        match self {
            DiffRequest::Plain(chunks) => chunks,
            DiffRequest::Rpc { chunks, .. } => chunks,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DiffRequest::Plain(chunks) => serde_json::json!(chunks),
            DiffRequest::Rpc { id, chunks } => serde_json::json!(RpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.clone(),
                method: DIFF_METHOD.to_string(),
                params: DiffParams {
                    chunks: chunks.clone()
                },
            }),
        }
    }

    /// Server side: the answer in the request's framing.
    pub fn respond(&self, unknown: Vec<ChunkId>) -> Value {
        match self {
            DiffRequest::Plain(_) => serde_json::json!(unknown),
            DiffRequest::Rpc { id, .. } => serde_json::json!(RpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.clone(),
                result: Some(DiffResult { unknown }),
                error: None,
            }),
        }
    }

    /// Client side: extract the unknown ids from the server's answer.
    pub fn read_response(&self, body: &[u8]) -> Result<Vec<ChunkId>> {
        match self {
            DiffRequest::Plain(_) => serde_json::from_slice(body)
                .map_err(|e| SyError::Protocol(format!("cannot parse diff response: {e}"))),
            DiffRequest::Rpc { .. } => {
                let resp: RpcResponse<DiffResult> = serde_json::from_slice(body)
                    .map_err(|e| SyError::Protocol(format!("cannot parse diff response: {e}")))?;
                if let Some(err) = resp.error {
                    return Err(SyError::Protocol(err));
                }
                resp.result
                    .map(|r| r.unknown)
                    .ok_or_else(|| SyError::Protocol("diff response without result".into()))
            }
        }
    }
}
