//! HTTP front for the peer network. Every route names the node it talks to
//! by port; the gateway itself holds no chain.
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    payload::{check_post_data, into_block_data},
    Block, Chain, Data, LedgerError,
};
use ledger_node::{
    protocol::{BLOCKCHAIN_ACCEPTED, EXITING, GET_CHAIN, SHUTDOWN},
    PeerTransport, TransportError,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct GatewayState {
    pub peer_host: String,
    pub transport: PeerTransport,
    pub genesis: Block,
}

impl GatewayState {
    fn node_addr(&self, port: u16) -> String {
        format!("{}:{}", self.peer_host, port)
    }

    async fn fetch_chain(&self, port: u16) -> Result<Chain, GatewayError> {
        let reply = self.transport.send(&self.node_addr(port), GET_CHAIN).await?;
        Ok(Chain::reconstruct_with(&self.genesis, &reply)?)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("node unreachable: {0}")]
    Node(#[from] TransportError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("node rejected the mined chain: {0}")]
    Rejected(String),

    #[error("mining task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Node(_) => StatusCode::BAD_GATEWAY,
            Self::Rejected(_) => StatusCode::CONFLICT,
            Self::Ledger(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("request failed: {self}");
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/mine_block/{port}", post(mine_block))
        .route("/get_chain/{port}", get(get_chain))
        .route("/validate/{port}", get(validate))
        .route("/shutdown/{port}", get(shutdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The body is read as JSON whatever its content type says.
fn parse_post_data(body: &[u8]) -> Result<Data, String> {
    let payload: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let entries = check_post_data(&payload).map_err(|e| e.to_string())?;
    Ok(into_block_data(entries))
}

/// Mines the posted transactions on top of the node's chain and hands the
/// extended chain back to the node.
pub async fn mine_block(
    State(state): State<GatewayState>,
    Path(port): Path<u16>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let data = match parse_post_data(&body) {
        Ok(data) => data,
        Err(reason) => {
            info!("refusing post data: {reason}");
            return Ok((StatusCode::BAD_REQUEST, Message::new("invalid post data")).into_response());
        }
    };

    let chain = state.fetch_chain(port).await?;
    let (chain, block) = tokio::task::spawn_blocking(move || {
        let mut chain = chain;
        let block = chain.mine_data(data)?;
        chain.append_mined(block.clone())?;
        Ok::<_, LedgerError>((chain, block))
    })
    .await??;

    let reply = state
        .transport
        .send(&state.node_addr(port), &chain.to_json()?)
        .await?;
    if reply != BLOCKCHAIN_ACCEPTED {
        return Err(GatewayError::Rejected(reply));
    }

    info!(port, hash = block.hash(), "block inserted");
    Ok(Json(json!({
        "message": "block inserted into blockchain",
        "hash": block.hash(),
        "prev_hash": block.prev_hash(),
    }))
    .into_response())
}

pub async fn get_chain(
    State(state): State<GatewayState>,
    Path(port): Path<u16>,
) -> Result<Json<Value>, GatewayError> {
    let chain = state.fetch_chain(port).await?;
    Ok(Json(json!({
        "chain": chain.records(),
        "length": chain.size(),
    })))
}

pub async fn validate(
    State(state): State<GatewayState>,
    Path(port): Path<u16>,
) -> Result<Json<Message>, GatewayError> {
    let chain = state.fetch_chain(port).await?;
    Ok(if chain.is_valid() {
        Message::new("is valid.")
    } else {
        Message::new("not valid.")
    })
}

pub async fn shutdown(
    State(state): State<GatewayState>,
    Path(port): Path<u16>,
) -> Result<Json<Message>, GatewayError> {
    let reply = state.transport.send(&state.node_addr(port), SHUTDOWN).await?;
    Ok(if reply == EXITING {
        Message::new("server is shutdown")
    } else {
        Message::new(format!("failed to shutdown server: {reply}"))
    })
}
