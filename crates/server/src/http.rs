// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of lfs-locks.
//
// lfs-locks is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// lfs-locks is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with lfs-locks. If not, see <https://www.gnu.org/licenses/>.

//! Axum handlers for the Git LFS locking endpoints.
//!
//! - GET  /locks         - List locks (query: id, path, refspec, cursor, limit)
//! - POST /locks         - Create a lock
//! - POST /locks/verify  - List locks split into ours/theirs
//!
//! Authentication happens upstream; the proxy in front of this service
//! passes the principal and its repository access in headers.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use lfs_locks::{LockError, LockFilters, LockRegistry, LockView, ListRequest, VerifyRequest};
use lfs_locks_common::{RepositoryAccess, RequestContext};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Media type of every response.
pub const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

pub const PRINCIPAL_HEADER: &str = "x-lfs-principal-id";
pub const ACCESS_HEADER: &str = "x-lfs-repository-access";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const ALREADY_LOCKED_MESSAGE: &str = "path is already locked";

/// Create Axum router for the locks endpoints
pub fn create_locks_router(registry: Arc<LockRegistry>) -> Router {
    Router::new()
        .route("/locks", get(handle_list_locks).post(handle_create_lock))
        .route("/locks/verify", post(handle_verify_locks))
        .with_state(registry)
}

/// Bind `http_addr` and serve the locks router on a separate task.
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_locks_http_server(
    registry: Arc<LockRegistry>,
    http_addr: SocketAddr,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(http_addr).await?;
    let local_addr = listener.local_addr()?;
    let router = create_locks_router(registry);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Locks HTTP server error");
        }
    });
    info!(addr = %local_addr, "Locks HTTP server listening");
    Ok((local_addr, handle))
}

/// Errors surfaced over HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Lock(#[from] LockError),
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Lock(err) => match err {
                LockError::Forbidden => StatusCode::FORBIDDEN,
                LockError::MalformedCursor(_) | LockError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LockError::IdentityResolution(_) => StatusCode::BAD_GATEWAY,
                LockError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                LockError::CorruptRecord(_) | LockError::ConfigError(_) | LockError::SerializationError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Locks request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Locks request rejected");
        }

        let body = serde_json::to_string(&MessageBody { message: &message })
            .unwrap_or_else(|_| "{\"message\":\"Internal error\"}".to_string());
        (status, [(header::CONTENT_TYPE, LFS_CONTENT_TYPE)], body).into_response()
    }
}

fn lfs_json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_string(body).map_err(LockError::from)?;
    Ok((status, [(header::CONTENT_TYPE, LFS_CONTENT_TYPE)], body).into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Extract RequestContext from HTTP headers
pub fn extract_context_from_headers(headers: &HeaderMap) -> Result<RequestContext, ApiError> {
    let principal_id = header_str(headers, PRINCIPAL_HEADER).ok_or_else(|| {
        ApiError::Unauthorized(format!("Missing {} header. Authentication required.", PRINCIPAL_HEADER))
    })?;

    let access = match header_str(headers, ACCESS_HEADER) {
        Some(raw) => raw
            .parse::<RepositoryAccess>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => RepositoryAccess::None,
    };

    let mut ctx = RequestContext::new(principal_id.to_string(), access)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    if let Some(authorization) = header_str(headers, header::AUTHORIZATION.as_str()) {
        ctx = ctx.with_authorization(authorization.to_string());
    }
    if let Some(request_id) = header_str(headers, REQUEST_ID_HEADER) {
        ctx = ctx.with_request_id(request_id.to_string());
    }
    Ok(ctx)
}

/// Parse a client limit; empty means "not sent".
///
/// Integers beyond the `i64` range saturate; the registry clamps them.
fn parse_limit(raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(limit) = value.parse::<i64>() {
        return Ok(Some(limit));
    }

    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Some(if negative { i64::MIN } else { i64::MAX }));
    }
    Err(LockError::InvalidInput(format!("limit must be an integer, got {:?}", value)).into())
}

/// Reject callers without push access before the body is looked at.
fn require_push(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.access().can_push() {
        Ok(())
    } else {
        Err(LockError::Forbidden.into())
    }
}

/// Query string of `GET /locks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListLocksQuery {
    pub id: Option<String>,
    pub path: Option<String>,
    pub refspec: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

impl ListLocksQuery {
    pub fn into_request(self) -> Result<ListRequest, ApiError> {
        Ok(ListRequest {
            limit: parse_limit(self.limit.as_deref())?,
            filters: LockFilters {
                id: self.id,
                path: self.path,
                refspec: self.refspec,
            },
            cursor: self.cursor,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefSpec {
    pub name: Option<String>,
}

/// Body of `POST /locks`.
#[derive(Debug, Deserialize)]
pub struct CreateLockRequest {
    pub path: String,
    #[serde(rename = "ref", default)]
    pub ref_spec: Option<RefSpec>,
}

/// A limit sent as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LimitValue {
    Number(i64),
    /// Numbers outside the `i64` range, and fractions
    Float(f64),
    Text(String),
}

/// Body of `POST /locks/verify`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyLocksRequest {
    pub cursor: Option<String>,
    pub limit: Option<LimitValue>,
    #[serde(rename = "ref", default)]
    pub ref_spec: Option<RefSpec>,
}

impl VerifyLocksRequest {
    pub fn into_request(self) -> Result<VerifyRequest, ApiError> {
        let limit = match self.limit {
            Some(LimitValue::Number(n)) => Some(n),
            // saturating cast
            Some(LimitValue::Float(f)) => Some(f as i64),
            Some(LimitValue::Text(text)) => parse_limit(Some(&text))?,
            None => None,
        };
        Ok(VerifyRequest {
            ref_name: self.ref_spec.and_then(|r| r.name),
            limit,
            cursor: self.cursor,
        })
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

#[derive(Serialize)]
struct LockResponse<'a> {
    lock: &'a LockView,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Handle GET /locks
async fn handle_list_locks(
    State(registry): State<Arc<LockRegistry>>,
    headers: HeaderMap,
    query: Result<Query<ListLocksQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let ctx = extract_context_from_headers(&headers)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e.body_text())))?;
    let page = registry.list_locks(&ctx, query.into_request()?).await?;
    lfs_json(StatusCode::OK, &page)
}

/// Handle POST /locks
async fn handle_create_lock(
    State(registry): State<Arc<LockRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = extract_context_from_headers(&headers)?;
    require_push(&ctx)?;
    let request: CreateLockRequest = parse_body(&body)?;
    let ref_name = request.ref_spec.and_then(|r| r.name).unwrap_or_default();

    let acquisition = registry.try_lock(&ctx, &request.path, &ref_name).await?;
    if acquisition.acquired {
        lfs_json(
            StatusCode::CREATED,
            &LockResponse {
                lock: &acquisition.lock,
                message: None,
            },
        )
    } else {
        lfs_json(
            StatusCode::CONFLICT,
            &LockResponse {
                lock: &acquisition.lock,
                message: Some(ALREADY_LOCKED_MESSAGE),
            },
        )
    }
}

/// Handle POST /locks/verify
async fn handle_verify_locks(
    State(registry): State<Arc<LockRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = extract_context_from_headers(&headers)?;
    require_push(&ctx)?;
    let request: VerifyLocksRequest = if body.is_empty() {
        VerifyLocksRequest::default()
    } else {
        parse_body(&body)?
    };
    let result = registry.verify_locks(&ctx, request.into_request()?).await?;
    lfs_json(StatusCode::OK, &result)
}
