//! Storage admin routes
//!
//! A single endpoint: POST runs a copy/move/rename/create operation, DELETE
//! removes a file or a whole folder. CORS preflight is answered by the
//! router's CORS layer.

use crate::api::AppState;
use crate::storage::{FolderOperationResult, MutationError};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;

use super::error::{extract_caller_id, AppError, OperationFailure, RequestEcho};
use super::types::{
    DeleteRequest, DeleteResponse, Operation, OperationRequest, OperationResponse, VALID_OPERATIONS,
};

pub const STORAGE_PATH: &str = "/admin/storage";

const ALLOWED_METHODS: &[&str] = &["POST", "DELETE", "OPTIONS"];

// ============================================================================
// ROUTES
// ============================================================================

pub fn storage_routes() -> Router<AppState> {
    Router::new().route(
        STORAGE_PATH,
        post(run_operation)
            .delete(delete_path)
            .fallback(method_not_allowed),
    )
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed(ALLOWED_METHODS)
}

async fn run_operation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OperationResponse>, AppError> {
    let caller_id = extract_caller_id(&state, &headers)?;
    let req: OperationRequest = parse_body(&body)?;

    let operation = match req.operation.as_deref() {
        None | Some("") => {
            return Err(AppError::UnknownOperation {
                message: "Missing operation".into(),
                valid: VALID_OPERATIONS,
            })
        }
        Some(raw) => raw.parse::<Operation>().map_err(|_| AppError::UnknownOperation {
            message: format!("Unknown operation: {}", raw),
            valid: VALID_OPERATIONS,
        })?,
    };

    let echo = RequestEcho {
        source_path: req.source_path.clone(),
        dest_path: req.dest_path.clone(),
        new_name: req.new_name.clone(),
        file_path: None,
    };

    let source = non_empty(&req.source_path);
    let dest = non_empty(&req.dest_path);
    let new_name = non_empty(&req.new_name);
    let mutator = &state.mutator;

    tracing::info!(caller = %caller_id, "storage operation {}", operation);

    let response = match operation {
        Operation::CopyFile => {
            let (source, dest) = require_pair(operation, source, "sourcePath", dest, "destPath")?;
            let meta = mutator
                .copy_file(&caller_id, source, dest)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            OperationResponse {
                success: true,
                message: "File copied successfully".into(),
                source_path: Some(source.to_string()),
                dest_path: Some(meta.path),
                ..OperationResponse::default()
            }
        }
        Operation::MoveFile => {
            let (source, dest) = require_pair(operation, source, "sourcePath", dest, "destPath")?;
            let meta = mutator
                .move_file(&caller_id, source, dest)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            OperationResponse {
                success: true,
                message: "File moved successfully".into(),
                source_path: Some(source.to_string()),
                dest_path: Some(meta.path),
                ..OperationResponse::default()
            }
        }
        Operation::RenameFile => {
            let (source, new_name) =
                require_pair(operation, source, "sourcePath", new_name, "newName")?;
            let meta = mutator
                .rename_file(&caller_id, source, new_name)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            OperationResponse {
                success: true,
                message: "File renamed successfully".into(),
                source_path: Some(source.to_string()),
                new_path: Some(meta.path),
                ..OperationResponse::default()
            }
        }
        Operation::MoveFolder => {
            let (source, dest) = require_pair(operation, source, "sourcePath", dest, "destPath")?;
            let (final_dest, result) = mutator
                .move_folder_into(&caller_id, source, dest)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            folder_response("Folder moved", source, final_dest.to_string(), result)
        }
        Operation::RenameFolder => {
            let (source, new_name) =
                require_pair(operation, source, "sourcePath", new_name, "newName")?;
            let (final_dest, result) = mutator
                .rename_folder(&caller_id, source, new_name)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            folder_response("Folder renamed", source, final_dest.to_string(), result)
        }
        Operation::CreateFolder => {
            let path = source.or(dest).ok_or_else(|| {
                AppError::BadRequest("sourcePath is required for createFolder".into())
            })?;
            let folder = mutator
                .create_folder(&caller_id, path)
                .await
                .map_err(|e| failure(&state, e, operation.as_str(), echo))?;
            OperationResponse {
                success: true,
                message: "Folder created successfully".into(),
                path: Some(folder.to_string()),
                ..OperationResponse::default()
            }
        }
    };

    Ok(Json(response))
}

async fn delete_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeleteResponse>, AppError> {
    let caller_id = extract_caller_id(&state, &headers)?;
    let req: DeleteRequest = parse_body(&body)?;

    let file_path = non_empty(&req.file_path)
        .ok_or_else(|| AppError::BadRequest("filePath is required".into()))?;
    let echo = RequestEcho {
        file_path: Some(file_path.to_string()),
        ..RequestEcho::default()
    };

    if req.is_folder.unwrap_or(false) {
        let result = state
            .mutator
            .delete_folder(&caller_id, file_path)
            .await
            .map_err(|e| failure(&state, e, "deleteFolder", echo))?;

        Ok(Json(DeleteResponse {
            success: true,
            path: file_path.to_string(),
            deleted_count: Some(result.processed_count),
            errors: Some(result.errors),
        }))
    } else {
        state
            .mutator
            .delete_file(&caller_id, file_path)
            .await
            .map_err(|e| match e {
                MutationError::NotFound(msg) => AppError::NotFound(msg),
                other => failure(&state, other, "deleteFile", echo),
            })?;

        Ok(Json(DeleteResponse {
            success: true,
            path: file_path.to_string(),
            deleted_count: None,
            errors: None,
        }))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Parse a JSON body; an empty body reads as `{}`
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn require_pair<'a>(
    operation: Operation,
    first: Option<&'a str>,
    first_name: &str,
    second: Option<&'a str>,
    second_name: &str,
) -> Result<(&'a str, &'a str), AppError> {
    match (first, second) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(AppError::BadRequest(format!(
            "{} and {} are required for {}",
            first_name, second_name, operation
        ))),
    }
}

fn folder_response(
    verb: &str,
    source: &str,
    final_dest: String,
    result: FolderOperationResult,
) -> OperationResponse {
    let message = if result.is_complete() {
        format!("{} successfully ({} objects)", verb, result.processed_count)
    } else {
        format!(
            "{} with errors ({} objects moved, {} failed)",
            verb,
            result.processed_count,
            result.errors.len()
        )
    };

    OperationResponse {
        success: true,
        message,
        source_path: Some(source.to_string()),
        dest_path: Some(final_dest),
        moved_count: Some(result.processed_count),
        errors: Some(result.errors),
        ..OperationResponse::default()
    }
}

/// Map a mutator error to its HTTP rendering.
///
/// Malformed input is a 400. Access denials share the 500 failure body unless
/// the server is configured to answer 403.
fn failure(state: &AppState, err: MutationError, operation: &str, input: RequestEcho) -> AppError {
    match err {
        MutationError::InvalidInput(msg) => AppError::BadRequest(msg),
        MutationError::AccessDenied(msg) if state.config.access_denied_forbidden => {
            AppError::Forbidden(msg)
        }
        other => {
            tracing::error!(operation, "storage operation failed: {}", other);
            AppError::Operation(Box::new(OperationFailure {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: other.to_string(),
                details: (!state.config.is_production())
                    .then(|| format!("{} ({:?})", other.kind(), other)),
                operation: operation.to_string(),
                input,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::router;
    use crate::auth;
    use crate::config::Config;
    use crate::storage::mutator::tests::FlakyStore;
    use crate::storage::ObjectStore;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        store: Arc<FlakyStore>,
        state: AppState,
    }

    impl Harness {
        async fn new(keys: &[&str]) -> Self {
            Self::with_config(keys, Config::for_tests()).await
        }

        async fn with_config(keys: &[&str], config: Config) -> Self {
            let store = Arc::new(FlakyStore::default());
            for key in keys {
                store.seed(key, Bytes::from_static(b"data")).await;
            }
            let state = AppState::new(store.clone(), config);
            Self { store, state }
        }

        fn token(&self, caller: &str) -> String {
            auth::create_access_token(&self.state.config.jwt_secret, caller, 1).unwrap()
        }

        async fn send(&self, method: Method, caller: Option<&str>, body: Value) -> (StatusCode, HeaderMap, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(STORAGE_PATH)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(caller) = caller {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(caller)));
            }
            let request = builder.body(Body::from(body.to_string())).unwrap();

            let response = router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, headers, value)
        }

        async fn post(&self, caller: &str, body: Value) -> (StatusCode, Value) {
            let (status, _, value) = self.send(Method::POST, Some(caller), body).await;
            (status, value)
        }

        async fn delete(&self, caller: &str, body: Value) -> (StatusCode, Value) {
            let (status, _, value) = self.send(Method::DELETE, Some(caller), body).await;
            (status, value)
        }

        async fn exists(&self, key: &str) -> bool {
            self.store.exists(key).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_preflight() {
        let h = Harness::new(&[]).await;
        let (status, headers, body) = h.send(Method::OPTIONS, None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for method in ["POST", "DELETE", "OPTIONS"] {
            assert!(methods.contains(method), "{} missing from {}", method, methods);
        }
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("content-type"));
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_cors_origin_on_errors() {
        let h = Harness::new(&[]).await;
        let (status, headers, _) = h
            .send(Method::POST, Some("u1"), json!({"operation": "bogus"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let h = Harness::new(&[]).await;
        for method in [Method::GET, Method::PUT, Method::PATCH] {
            let (status, headers, body) = h.send(method, Some("u1"), Value::Null).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body["allowedMethods"], json!(["POST", "DELETE", "OPTIONS"]));
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
    }

    #[tokio::test]
    async fn test_requires_token() {
        let h = Harness::new(&["users/u1/a.png"]).await;
        let (status, headers, body) = h
            .send(
                Method::POST,
                None,
                json!({"operation": "copyFile", "sourcePath": "users/u1/a.png", "destPath": "users/u1/b.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!h.exists("users/u1/b.png").await);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let h = Harness::new(&[]).await;
        let (status, body) = h.post("u1", json!({"operation": "explode"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["validOperations"].as_array().unwrap().len(), 6);

        let (status, body) = h.post("u1", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["validOperations"].is_array());
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let h = Harness::new(&[]).await;
        for body in [
            json!({"operation": "copyFile", "sourcePath": "users/u1/a.png"}),
            json!({"operation": "moveFile", "destPath": "users/u1/a.png"}),
            json!({"operation": "renameFile", "sourcePath": "users/u1/a.png"}),
            json!({"operation": "moveFolder", "sourcePath": "users/u1/a/", "destPath": ""}),
            json!({"operation": "renameFolder", "newName": "b"}),
            json!({"operation": "createFolder"}),
        ] {
            let (status, _) = h.post("u1", body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        }
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let h = Harness::new(&[]).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri(STORAGE_PATH)
            .header(header::AUTHORIZATION, format!("Bearer {}", h.token("u1")))
            .body(Body::from("{not json"))
            .unwrap();
        let response = router(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_copy_file() {
        let h = Harness::new(&["users/u1/a.png"]).await;
        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "copyFile", "sourcePath": "users/u1/a.png", "destPath": "users/u1/b.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["destPath"], "users/u1/b.png");
        assert!(h.exists("users/u1/a.png").await);
        assert!(h.exists("users/u1/b.png").await);
    }

    #[tokio::test]
    async fn test_cross_namespace_move_is_rejected() {
        let h = Harness::new(&["users/u1/a.png"]).await;
        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "moveFile", "sourcePath": "users/u1/a.png", "destPath": "users/u2/a.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["operation"], "moveFile");
        assert_eq!(body["destPath"], "users/u2/a.png");
        assert!(body["details"].as_str().unwrap().contains("AccessDenied"));
        assert_eq!(h.store.store_calls(), 0);
        assert!(!h.exists("users/u2/a.png").await);
    }

    #[tokio::test]
    async fn test_access_denied_as_forbidden() {
        let config = Config {
            access_denied_forbidden: true,
            ..Config::for_tests()
        };
        let h = Harness::with_config(&["users/u1/a.png"], config).await;
        let (status, _) = h
            .post(
                "u1",
                json!({"operation": "copyFile", "sourcePath": "users/u1/a.png", "destPath": "users/u2/a.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_production_hides_details() {
        let config = Config {
            app_env: "production".into(),
            ..Config::for_tests()
        };
        let h = Harness::with_config(&[], config).await;
        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "moveFile", "sourcePath": "users/u1/none.png", "destPath": "users/u1/b.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("does not exist"));
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_bad_request() {
        let h = Harness::new(&["users/u1/a.png"]).await;
        let (status, _) = h
            .post(
                "u1",
                json!({"operation": "copyFile", "sourcePath": "users/u1/a.png", "destPath": "users/u1/../u2/a.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rename_file() {
        let h = Harness::new(&["users/u1/docs/a.txt"]).await;
        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "renameFile", "sourcePath": "users/u1/docs/a.txt", "newName": "b.txt"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["newPath"], "users/u1/docs/b.txt");

        let (status, _) = h
            .post(
                "u1",
                json!({"operation": "renameFile", "sourcePath": "users/u1/docs/b.txt", "newName": "../c.txt"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_folder_twice() {
        let h = Harness::new(&[]).await;
        let create = json!({"operation": "createFolder", "sourcePath": "users/u1/photos"});

        let (status, body) = h.post("u1", create.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["path"], "users/u1/photos/");

        let (status, body) = h.post("u1", create).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("AlreadyExists"));
    }

    #[tokio::test]
    async fn test_move_folder_reports_partial_failure() {
        let h = Harness::new(&["users/u1/a/1", "users/u1/a/2", "users/u1/a/3", "users/u1/b/.keep"]).await;
        h.store.fail_copy.lock().unwrap().insert("users/u1/a/2".into());

        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "moveFolder", "sourcePath": "users/u1/a", "destPath": "users/u1/b"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["destPath"], "users/u1/b/a/");
        assert_eq!(body["movedCount"], 2);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
        assert_eq!(body["errors"][0]["item"], "users/u1/a/2");
        assert!(h.exists("users/u1/a/2").await);
        assert!(h.exists("users/u1/b/a/1").await);
    }

    #[tokio::test]
    async fn test_move_folder_into_itself() {
        let h = Harness::new(&["users/u1/a/1"]).await;
        let (status, _) = h
            .post(
                "u1",
                json!({"operation": "moveFolder", "sourcePath": "users/u1/a/", "destPath": "users/u1/a/sub"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_rename_folder() {
        let h = Harness::new(&["users/u1/a/1", "users/u1/a/x/2"]).await;
        let (status, body) = h
            .post(
                "u1",
                json!({"operation": "renameFolder", "sourcePath": "users/u1/a/", "newName": "z"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["destPath"], "users/u1/z/");
        assert_eq!(body["movedCount"], 2);
        assert!(body["errors"].as_array().unwrap().is_empty());
        assert!(h.exists("users/u1/z/x/2").await);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let h = Harness::new(&["users/u1/a.png"]).await;

        let (status, body) = h.delete("u1", json!({"filePath": "users/u1/a.png"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "users/u1/a.png");
        assert!(body.get("deletedCount").is_none());

        let (status, _) = h.delete("u1", json!({"filePath": "users/u1/a.png", "isFolder": false})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = h.delete("u1", json!({"isFolder": true})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_folder() {
        let keys: Vec<String> = (0..120).map(|i| format!("users/u1/photos/{}.png", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let h = Harness::new(&refs).await;

        let (status, body) = h
            .delete("u1", json!({"filePath": "users/u1/photos/", "isFolder": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedCount"], 120);
        assert!(body["errors"].as_array().unwrap().is_empty());

        // Deleting again is a no-op success
        let (status, body) = h
            .delete("u1", json!({"filePath": "users/u1/photos/", "isFolder": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedCount"], 0);
    }

    #[tokio::test]
    async fn test_delete_foreign_folder() {
        let h = Harness::new(&["users/u2/photos/1.png"]).await;
        let (status, body) = h
            .delete("u1", json!({"filePath": "users/u2/photos/", "isFolder": true}))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["filePath"], "users/u2/photos/");
        assert!(h.exists("users/u2/photos/1.png").await);
    }
}
