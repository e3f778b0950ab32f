//! HTTP surface of the chunk store.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::Value;
use sy_core::ChunkId;
use sy_core::protocol::{DIFF_PATH, DiffRequest, UPLOAD_PATH};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::store::ServerStore;

type AppState = Arc<ServerStore>;

pub fn router(store: AppState, max_body: usize) -> Router {
    Router::new()
        .route(DIFF_PATH, post(diff))
        .route(UPLOAD_PATH, post(upload_batch))
        .route(
            &format!("{UPLOAD_PATH}/{{id}}"),
            post(upload_one).put(upload_one),
        )
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn health() -> &'static str {
    "ok"
}

async fn diff(State(store): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let req = DiffRequest::parse(&body)?;
    let unknown = store.diff(req.chunks());
    debug!(candidates = req.chunks().len(), unknown = unknown.len(), "diff");
    Ok(Json(req.respond(unknown)))
}

fn parse_id(raw: &str) -> Result<ChunkId> {
    ChunkId::parse(raw).map_err(|_| ServerError::InvalidRequest(format!("bad chunk id {raw:?}")))
}

async fn upload_one(
    State(store): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    store.store_chunk(&id, &body).await?;
    Ok(StatusCode::OK)
}

async fn upload_batch(State(store): State<AppState>, mut multipart: Multipart) -> Result<StatusCode> {
    let mut chunks = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("multipart: {e}")))?
    {
        let name = field
            .name()
            .filter(|n| !n.is_empty())
            .or(field.file_name())
            .map(str::to_string)
            .ok_or_else(|| ServerError::InvalidRequest("multipart part without a name".into()))?;
        let id = parse_id(&name)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidRequest(format!("multipart part {name}: {e}")))?;
        chunks.push((id, bytes));
    }
    let stored = store.store_batch(&chunks).await?;
    debug!(parts = chunks.len(), stored, "batch upload");
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use sy_core::chunk_id;
    use tower::ServiceExt;

    async fn app() -> (tempfile::TempDir, AppState, Router) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(ServerStore::open(tmp.path()).await.unwrap());
        let app = router(Arc::clone(&store), 1 << 20);
        (tmp, store, app)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn plain_diff_lists_unknown_ids() {
        let (_tmp, store, app) = app().await;
        let a = chunk_id(b"a");
        let b = chunk_id(b"b");
        store.store_chunk(&a, b"a").await.unwrap();

        let (status, body) = call(&app, post_json(DIFF_PATH, format!("[\"{a}\",\"{b}\"]"))).await;
        assert_eq!(status, StatusCode::OK);
        let unknown: Vec<ChunkId> = serde_json::from_slice(&body).unwrap();
        assert_eq!(unknown, vec![b]);
    }

    #[tokio::test]
    async fn rpc_diff_is_answered_in_kind() {
        let (_tmp, _store, app) = app().await;
        let a = chunk_id(b"a");
        let body = format!(
            r#"{{"jsonrpc":"2.0","id":"7","method":"v1/chunks/diff","params":{{"chunks":["{a}"]}}}}"#
        );
        let (status, body) = call(&app, post_json(DIFF_PATH, body)).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["id"], "7");
        assert_eq!(v["result"]["unknown"], serde_json::json!([a.as_str()]));
    }

    #[tokio::test]
    async fn unknown_rpc_method_is_not_implemented() {
        let (_tmp, _store, app) = app().await;
        let body = r#"{"jsonrpc":"2.0","id":"1","method":"v1/chunks/gc","params":{}}"#;
        let (status, body) = call(&app, post_json(DIFF_PATH, body.into())).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert!(v["error"].as_str().unwrap().contains("v1/chunks/gc"));
    }

    #[tokio::test]
    async fn malformed_diff_is_bad_request() {
        let (_tmp, _store, app) = app().await;
        let (status, _) = call(&app, post_json(DIFF_PATH, "{not json".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn single_upload_then_diff_is_empty() {
        let (_tmp, store, app) = app().await;
        let id = chunk_id(b"payload");
        let req = Request::put(format!("{UPLOAD_PATH}/{id}"))
            .body(Body::from("payload"))
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert!(store.contains(&id));

        let (_, body) = call(&app, post_json(DIFF_PATH, format!("[\"{id}\"]"))).await;
        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn upload_with_bad_id_is_rejected() {
        let (_tmp, store, app) = app().await;
        let req = Request::post(format!("{UPLOAD_PATH}/abc123"))
            .body(Body::from("x"))
            .unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn multipart_batch_stores_every_part() {
        let (_tmp, store, app) = app().await;
        let a = chunk_id(b"first");
        let b = chunk_id(b"second");
        let mut body = Vec::new();
        for (id, bytes) in [(&a, "first"), (&b, "second")] {
            body.extend_from_slice(
                format!(
                    "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"{id}\"; filename=\"{id}\"\r\nContent-Type: application/octet-stream\r\n\r\n{bytes}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(b"--XBOUNDARY--\r\n");
        let req = Request::post(UPLOAD_PATH)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.len(), 2);
        assert_eq!(store.read_chunk(&b).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (_tmp, _store, app) = app().await;
        let (status, body) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
