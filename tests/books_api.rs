use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::Response,
    Router,
};
use bookserver::{
    modules::{
        self,
        books::{
            models::{Book, NewBook, REQUIRED_FIELDS},
            store::StoreError,
        },
    },
    BookStore, CatalogService, MemoryBookStore, UploadStore,
};
use bookserver_kernel::{settings::Settings, ModuleRegistry};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "bookserver-test-boundary";

const DUNE: [(&str, &str); 6] = [
    ("name", "Dune"),
    ("quantity", "5"),
    ("author", "Herbert"),
    ("category", "SciFi"),
    ("description", "Desert planet"),
    ("rating", "4.8"),
];

struct TestApp {
    router: Router,
    uploads: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_store(Arc::new(MemoryBookStore::default())).await
    }

    async fn with_store(store: Arc<dyn BookStore>) -> Self {
        Self::with_settings(store, Settings::default()).await
    }

    async fn with_settings(store: Arc<dyn BookStore>, settings: Settings) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let upload_store = UploadStore::open(uploads.path()).await.unwrap();
        let catalog = Arc::new(CatalogService::new(store, upload_store));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, catalog);

        Self {
            router: bookserver_http::build_router(&registry, &settings),
            uploads,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, path: &str) -> Response {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    async fn post_form(&self, fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Response {
        let request = Request::post("/books")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, image)))
            .unwrap();
        self.send(request).await
    }

    async fn list(&self) -> Vec<Value> {
        let response = self.get("/books").await;
        assert_eq!(response.status(), StatusCode::OK);
        match json_body(response).await {
            Value::Array(items) => items,
            other => panic!("expected array, got {other}"),
        }
    }

    async fn upload_count(&self) -> usize {
        let mut entries = tokio::fs::read_dir(self.uploads.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn without(field: &str) -> Vec<(&'static str, &'static str)> {
    DUNE.into_iter().filter(|(name, _)| *name != field).collect()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

struct OfflineStore;

#[async_trait]
impl BookStore for OfflineStore {
    async fn insert_one(&self, _book: NewBook) -> Result<String, StoreError> {
        Err(StoreError::UnexpectedId("server selection timeout".to_string()))
    }

    async fn find_all(&self) -> Result<Vec<Book>, StoreError> {
        Err(StoreError::UnexpectedId("server selection timeout".to_string()))
    }
}

#[tokio::test]
async fn root_reports_readiness() {
    let app = TestApp::new().await;

    let response = app.get("/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_bytes(response).await,
        b"The library is ready for readers"
    );
}

#[tokio::test]
async fn create_then_list_dune() {
    let app = TestApp::new().await;

    let response = app.post_form(&DUNE, None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["message"], "Book added successfully");
    let book_id = created["bookId"].as_str().unwrap().to_string();

    let books = app.list().await;
    assert_eq!(books.len(), 1);
    let book = &books[0];
    assert_eq!(book["_id"], book_id);
    assert_eq!(book["name"], "Dune");
    assert_eq!(book["quantity"], json!(5));
    assert!(book["quantity"].is_u64());
    assert_eq!(book["rating"], json!(4.8));
    assert!(book["rating"].is_f64());
    assert_eq!(book["author"], "Herbert");
    assert_eq!(book["category"], "SciFi");
    assert_eq!(book["description"], "Desert planet");
    assert!(book["imageUrl"].is_null());
    assert!(book["createdAt"].is_string());
}

#[tokio::test]
async fn missing_rating_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    app.post_form(&DUNE, None).await;
    let before = app.list().await.len();

    let response = app.post_form(&without("rating"), None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Missing required fields"})
    );
    assert_eq!(app.list().await.len(), before);
}

#[tokio::test]
async fn every_required_field_is_enforced() {
    let app = TestApp::new().await;

    for field in REQUIRED_FIELDS {
        let absent = app.post_form(&without(field), None).await;
        assert_eq!(absent.status(), StatusCode::BAD_REQUEST, "absent {field}");

        let empty: Vec<(&str, &str)> = DUNE
            .into_iter()
            .map(|(name, value)| if name == field { (name, "") } else { (name, value) })
            .collect();
        let empty = app.post_form(&empty, None).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST, "empty {field}");
    }

    assert!(app.list().await.is_empty());
}

#[tokio::test]
async fn uploaded_image_is_served_back() {
    let app = TestApp::new().await;
    let image: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

    let response = app.post_form(&DUNE, Some(("cover.png", image))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let books = app.list().await;
    let image_url = books[0]["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/uploads/"));
    assert!(image_url.ends_with(".png"));

    let served = app.get(&image_url).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(served).await, image);
}

#[tokio::test]
async fn rejected_submission_leaves_no_orphaned_upload() {
    let app = TestApp::new().await;

    let response = app
        .post_form(&without("author"), Some(("cover.jpg", &b"jpeg"[..])))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn non_numeric_fields_are_rejected() {
    let app = TestApp::new().await;
    let fields: Vec<(&str, &str)> = DUNE
        .into_iter()
        .map(|(name, value)| match name {
            "quantity" => (name, "lots"),
            "rating" => (name, "NaN"),
            _ => (name, value),
        })
        .collect();

    let response = app.post_form(&fields, Some(("cover.png", &b"png"[..]))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Invalid numeric fields", "fields": ["quantity", "rating"]})
    );
    assert!(app.list().await.is_empty());
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn second_image_part_is_rejected() {
    let app = TestApp::new().await;
    let mut body = multipart_body(&DUNE, Some(("a.png", &b"a"[..])));
    // Splice another image part in front of the closing boundary.
    let closing = format!("--{BOUNDARY}--\r\n");
    body.truncate(body.len() - closing.len());
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"b.png\"\r\n\r\nb\r\n{closing}"
        )
        .as_bytes(),
    );

    let response = app
        .send(
            Request::post("/books")
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Only one image may be uploaded"})
    );
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn json_submission_is_accepted() {
    let app = TestApp::new().await;
    let request = Request::post("/books")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Solaris",
                "quantity": 3,
                "author": "Lem",
                "category": "SciFi",
                "description": "Ocean planet",
                "rating": "4.1"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let books = app.list().await;
    assert_eq!(books[0]["name"], "Solaris");
    assert_eq!(books[0]["quantity"], json!(3));
    assert_eq!(books[0]["rating"], json!(4.1));
}

#[tokio::test]
async fn json_whole_float_quantity_is_stored_as_integer() {
    let app = TestApp::new().await;
    let request = Request::post("/books")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Dune",
                "quantity": 5.0,
                "author": "Herbert",
                "category": "SciFi",
                "description": "Desert planet",
                "rating": 4.8
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let books = app.list().await;
    assert_eq!(books[0]["quantity"], json!(5));
    assert_eq!(books[0]["rating"], json!(4.8));
}

#[tokio::test]
async fn multipart_without_boundary_is_rejected() {
    let app = TestApp::new().await;
    let request = Request::post("/books")
        .header(CONTENT_TYPE, "multipart/form-data")
        .body(Body::from(multipart_body(&DUNE, None)))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["message"].is_string());
    assert!(app.list().await.is_empty());
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let app = TestApp::new().await;
    let request = Request::post("/books")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("name=Dune"))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_preserves_insertion_order() {
    let app = TestApp::new().await;
    let titles = ["Dune", "Hyperion", "Neuromancer", "Foundation"];

    for title in titles {
        let fields: Vec<(&str, &str)> = DUNE
            .into_iter()
            .map(|(name, value)| if name == "name" { (name, title) } else { (name, value) })
            .collect();
        assert_eq!(app.post_form(&fields, None).await.status(), StatusCode::CREATED);
    }

    let listed: Vec<String> = app
        .list()
        .await
        .iter()
        .map(|book| book["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(listed, titles);
}

#[tokio::test]
async fn backend_failures_map_to_500() {
    let app = TestApp::with_store(Arc::new(OfflineStore)).await;

    let listed = app.get("/books").await;
    assert_eq!(listed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(listed).await,
        json!({"message": "Failed to fetch books"})
    );

    let created = app.post_form(&DUNE, None).await;
    assert_eq!(created.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(created).await;
    assert_eq!(body["message"], "Failed to add book");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("server selection timeout"));
}

#[tokio::test]
async fn unknown_upload_is_404() {
    let app = TestApp::new().await;

    assert_eq!(
        app.get("/uploads/1700000000000.png").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/uploads/..%2FCargo.toml").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn oversized_body_is_413() {
    let mut settings = Settings::default();
    settings.uploads.max_bytes = 1024;
    let app = TestApp::with_settings(Arc::new(MemoryBookStore::default()), settings).await;
    let image = vec![0u8; 4096];

    let response = app.post_form(&DUNE, Some(("big.png", image.as_slice()))).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.list().await.is_empty());
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn openapi_documents_catalog_routes() {
    let app = TestApp::new().await;

    let response = app.get("/docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = json_body(response).await;
    assert!(doc["paths"]["/books"]["get"].is_object());
    assert!(doc["paths"]["/books"]["post"].is_object());
    assert!(doc["paths"]["/uploads/{filename}"]["get"].is_object());
    assert!(doc["components"]["schemas"]["Book"].is_object());
}
