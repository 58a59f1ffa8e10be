use serde::{Deserialize, Serialize};

const STORAGE_PATH: &str = "/admin/storage";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub struct RestClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

// --- Requests ---

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationRequest<'a> {
    operation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    file_path: &'a str,
    is_folder: bool,
}

// --- Responses ---

#[derive(Debug, Clone, Deserialize)]
pub struct ItemError {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub message: String,
    pub path: Option<String>,
    pub dest_path: Option<String>,
    pub new_path: Option<String>,
    pub moved_count: Option<usize>,
    #[serde(default)]
    pub errors: Vec<ItemError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub path: String,
    pub deleted_count: Option<usize>,
    #[serde(default)]
    pub errors: Vec<ItemError>,
}

impl RestClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, STORAGE_PATH)
    }

    pub async fn copy_file(&self, source: &str, dest: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "copyFile",
            source_path: Some(source),
            dest_path: Some(dest),
            ..Default::default()
        })
        .await
    }

    pub async fn move_file(&self, source: &str, dest: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "moveFile",
            source_path: Some(source),
            dest_path: Some(dest),
            ..Default::default()
        })
        .await
    }

    pub async fn rename_file(&self, source: &str, new_name: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "renameFile",
            source_path: Some(source),
            new_name: Some(new_name),
            ..Default::default()
        })
        .await
    }

    pub async fn move_folder(&self, source: &str, dest_parent: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "moveFolder",
            source_path: Some(source),
            dest_path: Some(dest_parent),
            ..Default::default()
        })
        .await
    }

    pub async fn rename_folder(&self, source: &str, new_name: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "renameFolder",
            source_path: Some(source),
            new_name: Some(new_name),
            ..Default::default()
        })
        .await
    }

    pub async fn create_folder(&self, path: &str) -> Result<OperationResponse, ApiError> {
        self.operation(OperationRequest {
            operation: "createFolder",
            source_path: Some(path),
            ..Default::default()
        })
        .await
    }

    pub async fn delete(&self, path: &str, is_folder: bool) -> Result<DeleteResponse, ApiError> {
        let resp = self
            .client
            .delete(self.url())
            .bearer_auth(&self.token)
            .json(&DeleteRequest {
                file_path: path,
                is_folder,
            })
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn operation(&self, request: OperationRequest<'_>) -> Result<OperationResponse, ApiError> {
        tracing::debug!("{} {}", request.operation, request.source_path.unwrap_or(""));

        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_omits_unused_fields() {
        let body = serde_json::to_value(OperationRequest {
            operation: "renameFile",
            source_path: Some("users/u1/a.txt"),
            new_name: Some("b.txt"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body["operation"], "renameFile");
        assert_eq!(body["sourcePath"], "users/u1/a.txt");
        assert_eq!(body["newName"], "b.txt");
        assert!(body.get("destPath").is_none());
    }

    #[test]
    fn test_delete_body() {
        let body = serde_json::to_value(DeleteRequest {
            file_path: "users/u1/docs/",
            is_folder: true,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"filePath": "users/u1/docs/", "isFolder": true}));
    }

    #[test]
    fn test_parses_partial_folder_move() {
        let resp: OperationResponse = serde_json::from_str(
            r#"{"success":true,"message":"Folder moved with errors","destPath":"users/u1/b/docs/",
                "movedCount":2,"errors":[{"item":"users/u1/docs/x","error":"boom"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.dest_path.as_deref(), Some("users/u1/b/docs/"));
        assert_eq!(resp.moved_count, Some(2));
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.errors[0].item, "users/u1/docs/x");
    }

    #[test]
    fn test_parses_delete_without_errors() {
        let resp: DeleteResponse =
            serde_json::from_str(r#"{"success":true,"path":"users/u1/a.txt"}"#).unwrap();
        assert!(resp.success);
        assert!(resp.errors.is_empty());
        assert_eq!(resp.deleted_count, None);
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: r#"{"error":"Invalid path"}"#.into(),
        };
        assert_eq!(err.to_string(), r#"400 Bad Request: {"error":"Invalid path"}"#);
    }
}
