use crate::application::loan::ServiceDependencies;
use crate::protocol::{Reply, decode_envelope, encode_reply, wsdl};
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{dispatch::dispatch, error::ApiError};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    /// GETでサービス記述を返すかどうか
    pub discovery_enabled: bool,
    /// サービス記述に載せるエンドポイントURL
    pub public_url: String,
}

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

// ============================================================================
// Operation endpoint (POST)
// ============================================================================

/// POST /ws, POST /loan - エンベロープを受け取り操作を実行
///
/// 操作レベルのエラー（在庫なし、貸出なしなど）は200の応答に`error`として載せる。
/// エンベロープ自体を解釈できない場合のみfaultを返す。
pub async fn soap_endpoint(State(state): State<Arc<AppState>>, body: String) -> Response {
    match handle_envelope(&state, &body).await {
        Ok(xml) => (StatusCode::OK, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], xml).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_envelope(state: &AppState, body: &str) -> Result<String, ApiError> {
    let envelope = decode_envelope(body)?;
    let response = dispatch(&state.service_deps, &envelope).await?;
    Ok(encode_reply(&Reply::Operation(response)))
}

// ============================================================================
// Discovery (GET)
// ============================================================================

/// GET /ws, GET /loan - サービス記述を返す
pub async fn discovery(State(state): State<Arc<AppState>>) -> Response {
    if !state.discovery_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        wsdl::describe(&state.public_url),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
