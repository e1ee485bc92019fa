//! The API error taxonomy.
//!
//! [`ApiError`] covers every failure a caller can see. Client input errors
//! map to 4xx with a stable snake_case error string; upstream chain
//! failures map to 502; anything internal maps to 500 with a correlation
//! id that also lands in the server log. Action-level failures are NOT
//! errors -- they become `ACTION_REJECTED` events inside the tick.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use mirage_chain::ChainError;
use mirage_db::DbError;

/// Errors surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No bearer token header was supplied.
    #[error("missing_token")]
    MissingToken,

    /// The supplied token matches no agent.
    #[error("invalid_token")]
    InvalidToken,

    /// The authenticated agent is not in the world.
    #[error("agent_not_found")]
    AgentNotFound,

    /// The authenticated agent is dead and can no longer act.
    #[error("agent_dead")]
    AgentDead,

    /// The trust-mode payment reference is malformed.
    #[error("invalid_tx_ref")]
    InvalidTxRef,

    /// Chain mode requires a wallet address with the entry request.
    #[error("missing_agent_address")]
    MissingAgentAddress,

    /// The chain verifier reports the entry fee unpaid.
    #[error("payment_required")]
    PaymentRequired,

    /// The chain verifier could not be reached.
    #[error("chain_rpc_unreachable: {0}")]
    ChainUnreachable(String),

    /// A database operation failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A serialization step failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ChainError> for ApiError {
    fn from(error: ChainError) -> Self {
        Self::ChainUnreachable(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::AgentNotFound => (StatusCode::NOT_FOUND, "agent_not_found"),
            Self::AgentDead => (StatusCode::FORBIDDEN, "agent_dead"),
            Self::InvalidTxRef => (StatusCode::BAD_REQUEST, "invalid_tx_ref"),
            Self::MissingAgentAddress => (StatusCode::BAD_REQUEST, "missing_agent_address"),
            Self::PaymentRequired => (StatusCode::PAYMENT_REQUIRED, "payment_required"),
            Self::ChainUnreachable(_) => (StatusCode::BAD_GATEWAY, "chain_rpc_unreachable"),
            Self::Db(_) | Self::Serialization(_) => {
                // Internal breaches fail loudly in the log, opaquely to
                // the caller, tied together by a correlation id.
                let request_id = uuid::Uuid::new_v4();
                tracing::error!(%request_id, error = %self, "Internal error serving request");
                let body = serde_json::json!({
                    "error": "internal_error",
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    "request_id": request_id.to_string(),
                });
                return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
