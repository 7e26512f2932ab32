//! News and attachment calls against the CMS API.
//!
//! Listing is public; creating posts and uploading files need the bearer
//! token that the session-bound `ApiClient` attaches.

#[cfg(test)]
#[path = "news_test.rs"]
mod news_test;

use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, ApiError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: i64,
    pub filename: String,
    /// Server-relative path or absolute URL.
    pub filepath: String,
    pub uploaded_at: String,
    #[serde(default)]
    pub is_image: bool,
}

impl FileItem {
    #[must_use]
    pub fn download_url(&self, api: &ApiClient) -> String {
        api.resolve_file_url(&self.filepath)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub files: Vec<FileItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
}

/// `GET /news/`, newest first as returned by the server.
///
/// # Errors
///
/// Returns [`ApiError`] on transport failure, non-2xx status, or a malformed body.
pub async fn list_news(api: &ApiClient) -> Result<Vec<NewsItem>, ApiError> {
    api.get("/news/").await?.into_json()
}

/// `POST /news/`. Requires a signed-in session.
///
/// # Errors
///
/// Returns [`ApiError`] on transport failure, non-2xx status, or a malformed body.
pub async fn create_news(api: &ApiClient, draft: &NewsDraft) -> Result<NewsItem, ApiError> {
    api.post("/news/", draft).await?.into_json()
}

/// `POST /news/{id}/files` as multipart field `file`. Requires a signed-in session.
///
/// # Errors
///
/// Returns [`ApiError`] on transport failure, non-2xx status, or a malformed body.
pub async fn upload_file(api: &ApiClient, news_id: i64, filename: &str, bytes: Vec<u8>) -> Result<FileItem, ApiError> {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_owned());
    let form = reqwest::multipart::Form::new().part("file", part);
    api.post_multipart(&format!("/news/{news_id}/files"), form)
        .await?
        .into_json()
}
