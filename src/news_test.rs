use std::sync::Arc;

use super::*;
use crate::session::{Credentials, SessionStore};
use crate::storage::MemoryStorage;
use crate::test_helpers::{spawn_api, test_config};

fn store_for(base: &str) -> SessionStore {
    let api = ApiClient::new(&test_config(base)).unwrap();
    SessionStore::new(api, Arc::new(MemoryStorage::new()))
}

#[tokio::test]
async fn list_news_is_public() {
    let base = spawn_api().await;
    let store = store_for(&base);

    let news = list_news(store.api()).await.unwrap();
    assert_eq!(news.len(), 2);
    assert_eq!(news[0].title, "Second");
    assert_eq!(news[0].files.len(), 1);
    assert!(news[0].files[0].is_image);
    assert!(news[1].files.is_empty());
    assert!(news[1].updated_at.is_none());
}

#[tokio::test]
async fn file_download_url_resolves_against_base() {
    let base = spawn_api().await;
    let store = store_for(&base);

    let news = list_news(store.api()).await.unwrap();
    let url = news[0].files[0].download_url(store.api());
    assert_eq!(url, format!("{base}/uploads/a.png"));
}

#[tokio::test]
async fn create_news_requires_login() {
    let base = spawn_api().await;
    let store = store_for(&base);
    let draft = NewsDraft { title: "Hello".into(), content: "World".into() };

    let err = create_news(store.api(), &draft).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.detail(), Some("Not authenticated"));

    store.login(&Credentials::new("admin", "admin123")).await.unwrap();
    let created = create_news(store.api(), &draft).await.unwrap();
    assert_eq!(created.id, 3);
    assert_eq!(created.title, "Hello");
    assert_eq!(created.content, "World");
}

#[tokio::test]
async fn create_news_after_logout_is_rejected() {
    let base = spawn_api().await;
    let store = store_for(&base);
    store.login(&Credentials::new("admin", "admin123")).await.unwrap();
    store.logout();

    let draft = NewsDraft { title: "t".into(), content: "c".into() };
    let err = create_news(store.api(), &draft).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn upload_file_sends_multipart_with_token() {
    let base = spawn_api().await;
    let store = store_for(&base);
    store.login(&Credentials::new("admin", "admin123")).await.unwrap();

    let file = upload_file(store.api(), 2, "notes.txt", b"hello".to_vec()).await.unwrap();
    assert_eq!(file.id, 42);
    assert_eq!(file.filename, "notes.txt");
    assert_eq!(file.filepath, "uploads/notes.txt");
    assert!(!file.is_image);
}

#[test]
fn news_item_deserializes_without_optional_fields() {
    let json = r#"{"id": 9, "title": "t", "content": "c", "created_at": "2024-01-01T00:00:00"}"#;
    let item: NewsItem = serde_json::from_str(json).unwrap();
    assert!(item.files.is_empty());
    assert!(item.updated_at.is_none());
}
