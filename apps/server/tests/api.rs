//! Gateway tests: the full router against an in-memory database.

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_core::Role;
use libris_db::{Database, DbConfig};
use libris_server::{router, AppState, ServerConfig};

struct TestApp {
    router: Router,
    db: Database,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db.clone(), ServerConfig::for_tests());
        TestApp {
            router: router(state),
            db,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Registers a member through the API and returns its token.
    async fn member(&self, username: &str) -> String {
        let (status, body) = self
            .post(
                "/api/register",
                None,
                json!({ "username": username, "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a staff account directly and logs it in.
    async fn staff(&self, username: &str) -> String {
        self.db
            .users()
            .create(username, "password123", Role::Staff)
            .await
            .unwrap();
        let (status, body) = self
            .post(
                "/api/token",
                None,
                json!({ "username": username, "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_book(&self, staff: &str, isbn: &str, copies: i64) -> String {
        let (status, body) = self
            .post(
                "/api/books",
                Some(staff),
                json!({
                    "title": "Book X",
                    "isbn": isbn,
                    "description": "The one everybody wants",
                    "total_copies": copies
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn available(&self, book_id: &str) -> i64 {
        let (_, body) = self.get(&format!("/api/books/{book_id}"), None).await;
        body["available_copies"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn registration_flow() {
    let app = TestApp::new().await;

    let (status, hints) = app.get("/api/register", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hints["password"]["min_length"], 8);

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({ "username": "ana", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["message"].is_string());
    assert!(body["token"].is_string());

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({ "username": "ana", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());

    let (status, body) = app
        .post("/api/register", None, json!({ "username": "", "password": "short" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
    assert!(body["password"].is_array());
}

#[tokio::test]
async fn login_checks_password() {
    let app = TestApp::new().await;
    app.member("ana").await;

    let (status, body) = app
        .post(
            "/api/token",
            None,
            json!({ "username": "ana", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "member");

    let (status, body) = app
        .post(
            "/api/token",
            None,
            json!({ "username": "ana", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn catalog_writes_need_staff() {
    let app = TestApp::new().await;
    let member = app.member("ana").await;
    let staff = app.staff("carol").await;
    let book = json!({
        "title": "Solaris",
        "isbn": "9780156027601",
        "description": "Ocean planet",
        "total_copies": 2
    });

    let (status, _) = app.post("/api/books", None, book.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/books", Some(&member), book.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/books", Some(&staff), book).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["available_copies"], 2);

    // Reads are public.
    let (status, list) = app.get("/api/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, errors) = app
        .post(
            "/api/books",
            Some(&staff),
            json!({ "title": "", "isbn": "97801-56", "description": "x", "total_copies": -1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors["title"].is_array());
    assert!(errors["isbn"].is_array());
    assert!(errors["total_copies"].is_array());
}

#[tokio::test]
async fn author_crud_over_http() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;

    let (status, author) = app
        .post(
            "/api/authors",
            Some(&staff),
            json!({ "name": "Stanislaw", "surname": "Lem", "biography": "Krakow" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = author["id"].as_str().unwrap();

    let (status, fetched) = app.get(&format!("/api/authors/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["surname"], "Lem");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/authors/{id}"), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/authors/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn loans_require_a_token() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/loans", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/loans", None, json!({ "book": "x" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/books", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn book_x_over_http() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;
    let a = app.member("user_a").await;
    let b = app.member("user_b").await;
    let c = app.member("user_c").await;
    let book = app.create_book(&staff, "9780000000002", 2).await;

    let (status, loan1) = app.post("/api/loans", Some(&a), json!({ "book": book })).await;
    assert_eq!(status, StatusCode::CREATED, "{loan1}");
    assert_eq!(loan1["status"], "ACTIVE");
    assert_eq!(loan1["book"], book.as_str());
    assert!(loan1["returned_at"].is_null());
    assert_eq!(app.available(&book).await, 1);

    let (status, _) = app.post("/api/loans", Some(&b), json!({ "book": book })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.available(&book).await, 0);

    let (status, body) = app.post("/api/loans", Some(&c), json!({ "book": book })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no copies available for this book");
    assert_eq!(app.available(&book).await, 0);

    let loan1_uri = format!("/api/loans/{}", loan1["id"].as_str().unwrap());
    let (status, closed) = app
        .send(Method::PATCH, &loan1_uri, Some(&a), Some(json!({ "estado": "RETURNED" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert_eq!(closed["status"], "RETURNED");
    assert!(closed["returned_at"].is_string());
    assert_eq!(app.available(&book).await, 1);

    let (status, body) = app
        .send(Method::PUT, &loan1_uri, Some(&a), Some(json!({ "estado": "RETURNED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "this loan was already returned");

    let (status, _) = app.post("/api/loans", Some(&a), json!({ "book": book })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.available(&book).await, 0);
}

#[tokio::test]
async fn duplicate_open_conflicts() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;
    let a = app.member("user_a").await;
    let book = app.create_book(&staff, "9780000000002", 3).await;

    app.post("/api/loans", Some(&a), json!({ "book": book })).await;
    let (status, body) = app.post("/api/loans", Some(&a), json!({ "book": book })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("duplicate active loan"));
    assert_eq!(app.available(&book).await, 2);
}

#[tokio::test]
async fn loan_visibility_follows_role() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;
    let a = app.member("user_a").await;
    let b = app.member("user_b").await;
    let book = app.create_book(&staff, "9780000000002", 2).await;

    let (_, loan) = app.post("/api/loans", Some(&a), json!({ "book": book })).await;
    let loan_uri = format!("/api/loans/{}", loan["id"].as_str().unwrap());

    let (status, mine) = app.get("/api/loans", Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, theirs) = app.get("/api/loans", Some(&b)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(theirs.as_array().unwrap().is_empty());

    let (status, _) = app.get(&loan_uri, Some(&b)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, all) = app.get("/api/loans", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = app.get(&loan_uri, Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bad_loan_bodies_are_field_errors() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;
    let a = app.member("user_a").await;
    let book = app.create_book(&staff, "9780000000002", 1).await;

    let (status, body) = app.post("/api/loans", Some(&a), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["book"].is_array());

    let (status, _) = app.post("/api/loans", Some(&a), json!({ "book": "missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, loan) = app.post("/api/loans", Some(&a), json!({ "book": book })).await;
    let loan_uri = format!("/api/loans/{}", loan["id"].as_str().unwrap());

    let (status, body) = app
        .send(Method::PATCH, &loan_uri, Some(&a), Some(json!({ "estado": "BORROWED" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["estado"].is_array());

    let (status, body) = app
        .send(Method::PATCH, &loan_uri, Some(&a), Some(json!({ "status": "LOST" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LOST");
    assert_eq!(app.available(&book).await, 0);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/loans")
        .header(AUTHORIZATION, format!("Bearer {a}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_admin_is_staff_only() {
    let app = TestApp::new().await;
    let staff = app.staff("carol").await;
    let a = app.member("user_a").await;
    let book = app.create_book(&staff, "9780000000002", 1).await;
    app.post("/api/loans", Some(&a), json!({ "book": book })).await;

    let (status, _) = app.get("/api/users", Some(&a)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = app.get("/api/users", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let member_id = users
        .iter()
        .find(|u| u["username"] == "user_a")
        .and_then(|u| u["id"].as_str())
        .unwrap()
        .to_string();

    let (status, promoted) = app
        .send(
            Method::PUT,
            &format!("/api/users/{member_id}"),
            Some(&staff),
            Some(json!({ "role": "staff" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "staff");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/users/{member_id}"), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/books/{book}"), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
