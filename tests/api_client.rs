mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{auth_body, respond, respond_text, MockTransport};
use serde_json::json;
use todosync::backend::client::UploadEncoding;
use todosync::backend::{ApiClient, ApiError, Location, MultipartUpload, NewTodo, RequestBody, TodoPatch};
use todosync::constants::{KEY_SESSION_TOKEN, KEY_SESSION_USER_ID};
use todosync::session::{Session, SessionContext};
use todosync::storage::{KeyValueStore, MemoryStore};

async fn logged_in(transport: Arc<MockTransport>) -> ApiClient {
    let session = Arc::new(SessionContext::new(Arc::new(MemoryStore::new())));
    session
        .establish(Session {
            token: "tok-123".to_string(),
            user_id: Some("u1".to_string()),
        })
        .await
        .unwrap();
    ApiClient::new(transport, session)
}

#[tokio::test]
async fn test_register_persists_session_without_sending_credential() {
    let store = Arc::new(MemoryStore::new());
    let session = Arc::new(SessionContext::new(store.clone()));
    let transport = MockTransport::new(|_, _| respond(201, auth_body()));
    let api = ApiClient::new(transport.clone(), session);

    let auth = api.register("ana@example.com", "pw").await.unwrap();
    assert_eq!(auth.user.email, "ana@example.com");

    let call = &transport.calls()[0];
    assert_eq!(call.path, "/auth/register");
    assert!(call.bearer.is_none());
    match &call.body {
        RequestBody::Json(body) => assert_eq!(body, &json!({"email": "ana@example.com", "password": "pw"})),
        other => panic!("unexpected body: {other:?}"),
    }

    assert_eq!(store.get(KEY_SESSION_TOKEN).await.unwrap().as_deref(), Some("tok-123"));
    assert_eq!(store.get(KEY_SESSION_USER_ID).await.unwrap().as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_authenticated_calls_carry_bearer() {
    let transport = MockTransport::new(|_, _| respond(200, json!([])));
    let api = logged_in(transport.clone()).await;

    api.list_todos().await.unwrap();
    assert_eq!(transport.calls()[0].bearer.as_deref(), Some("tok-123"));
}

#[tokio::test]
async fn test_payload_with_or_without_data_envelope() {
    let transport = MockTransport::new(|request, _| match request.path.as_str() {
        "/todos/wrapped" => respond(200, json!({"data": {"id": "wrapped", "title": "w", "completed": true}})),
        _ => respond(200, json!({"_id": "bare", "title": "b", "user_id": "u1"})),
    });
    let api = logged_in(transport).await;

    let wrapped = api.get_todo("wrapped").await.unwrap();
    assert_eq!(wrapped.id, "wrapped");
    assert!(wrapped.completed);

    let bare = api.get_todo("bare").await.unwrap();
    assert_eq!(bare.id, "bare");
    assert_eq!(bare.user_id.as_deref(), Some("u1"));
    assert!(!bare.completed);
}

#[tokio::test]
async fn test_unknown_fields_are_kept() {
    let transport = MockTransport::new(|_, _| {
        respond(
            200,
            json!({"id": "1", "title": "t", "photoUrl": "/p.jpg", "attachments": [{"url": "/a.jpg"}]}),
        )
    });
    let api = logged_in(transport).await;

    let todo = api.get_todo("1").await.unwrap();
    assert_eq!(todo.field("photoUrl"), Some(&json!("/p.jpg")));
    assert!(todo.field("attachments").is_some());
}

#[tokio::test]
async fn test_create_sends_only_present_fields() {
    let transport = MockTransport::new(|_, _| respond(201, json!({"id": "n1", "title": "Milk"})));
    let api = logged_in(transport.clone()).await;

    api.create_todo(&NewTodo {
        title: "Milk".to_string(),
        image: None,
        location: Some(Location {
            latitude: -33.45,
            longitude: -70.66,
        }),
    })
    .await
    .unwrap();

    let call = &transport.calls()[0];
    assert_eq!((call.method.as_str(), call.path.as_str()), ("POST", "/todos"));
    match &call.body {
        RequestBody::Json(body) => {
            assert_eq!(
                body,
                &json!({"title": "Milk", "location": {"latitude": -33.45, "longitude": -70.66}})
            );
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_and_toggle_use_patch() {
    let transport = MockTransport::new(|_, _| respond(200, json!({"id": "1", "title": "new", "completed": true})));
    let api = logged_in(transport.clone()).await;

    let patch = TodoPatch {
        title: Some("new".to_string()),
        ..Default::default()
    };
    api.update_todo("1", &patch).await.unwrap();
    api.toggle_todo("1", true).await.unwrap();

    let calls = transport.calls();
    assert!(calls.iter().all(|c| c.method == "PATCH" && c.path == "/todos/1"));
    assert!(matches!(&calls[0].body, RequestBody::Json(b) if b == &json!({"title": "new"})));
    assert!(matches!(&calls[1].body, RequestBody::Json(b) if b == &json!({"completed": true})));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let transport = MockTransport::new(|_, _| respond_text(204, ""));
    let api = logged_in(transport.clone()).await;

    api.delete_todo("1").await.unwrap();
    api.delete_image("u1", "img-9").await.unwrap();

    let paths: Vec<_> = transport.calls().into_iter().map(|c| (c.method, c.path)).collect();
    assert_eq!(
        paths,
        vec![
            ("DELETE".to_string(), "/todos/1".to_string()),
            ("DELETE".to_string(), "/images/u1/img-9".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_error_taxonomy() {
    let transport = MockTransport::new(|request, _| match request.path.as_str() {
        "/todos/missing" => respond(404, json!({"message": "Todo not found"})),
        "/todos/garbage" => respond_text(200, "<html>oops</html>"),
        "/todos/big" => respond_text(413, "Request Entity Too Large"),
        _ => respond(200, json!({"unexpected": true})),
    });
    let api = logged_in(transport).await;

    match api.get_todo("missing").await.unwrap_err() {
        ApiError::Server { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Todo not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    match api.get_todo("garbage").await.unwrap_err() {
        ApiError::Parse { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("unexpected error: {other:?}"),
    }

    let too_large = api.get_todo("big").await.unwrap_err();
    assert!(too_large.is_payload_too_large());
    assert_eq!(too_large.status(), Some(413));

    // A body without an id cannot be a task
    assert!(matches!(api.get_todo("other").await.unwrap_err(), ApiError::Parse { .. }));
}

#[tokio::test]
async fn test_records_with_duplicate_spellings_and_nulls() {
    let transport = MockTransport::new(|_, _| {
        respond(
            200,
            json!([
                {"_id": "mongo", "id": "a1", "title": "one", "completed": false,
                 "createdAt": "2024-05-01T10:00:00Z", "created_at": "ignored",
                 "userId": "u1", "user_id": "u2"},
                {"_id": "b2", "title": null, "completed": null, "location": null, "imageUrl": "/b.jpg"},
                {"id": 42, "title": "numeric"}
            ]),
        )
    });
    let api = logged_in(transport).await;

    let todos = api.list_todos().await.unwrap();
    assert_eq!(todos.len(), 3);

    assert_eq!(todos[0].id, "a1");
    assert_eq!(todos[0].created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    assert_eq!(todos[0].user_id.as_deref(), Some("u1"));
    // Consumed spellings do not leak into the unknown fields
    assert!(todos[0].field("_id").is_none());
    assert!(todos[0].field("created_at").is_none());

    assert_eq!(todos[1].id, "b2");
    assert_eq!(todos[1].title, "");
    assert!(!todos[1].completed);
    assert_eq!(todos[1].location, None);
    assert_eq!(todos[1].field("imageUrl"), Some(&json!("/b.jpg")));

    assert_eq!(todos[2].id, "42");
}

#[tokio::test]
async fn test_auth_user_with_both_id_spellings() {
    let transport = MockTransport::new(|_, _| {
        respond(
            200,
            json!({"token": "t", "user": {"_id": "m1", "id": "u9", "email": "ana@example.com", "createdAt": null}}),
        )
    });
    let api = ApiClient::new(transport, Arc::new(SessionContext::new(Arc::new(MemoryStore::new()))));

    let auth = api.login("ana@example.com", "pw").await.unwrap();
    assert_eq!(auth.user.id, "u9");
    assert_eq!(auth.user.created_at, None);
}

#[tokio::test]
async fn test_per_operation_timeouts() {
    let transport = MockTransport::new(|request, _| match request.path.as_str() {
        "/auth/login" => respond(200, auth_body()),
        "/todos" if request.method == "GET" => respond(200, json!([])),
        "/images" => respond(200, json!({"url": "/uploads/a.jpg"})),
        _ => respond(200, json!({"id": "1", "title": "t"})),
    });
    let api = ApiClient::new(transport.clone(), Arc::new(SessionContext::new(Arc::new(MemoryStore::new()))));

    api.login("ana@example.com", "pw").await.unwrap();
    api.list_todos().await.unwrap();
    api.get_todo("1").await.unwrap();
    api.create_todo(&NewTodo {
        title: "t".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();
    api.update_todo("1", &TodoPatch::default()).await.unwrap();
    api.toggle_todo("1", true).await.unwrap();
    api.delete_todo("1").await.unwrap();
    let upload = MultipartUpload {
        field_name: "image".to_string(),
        file_name: "a.jpg".to_string(),
        mime: "image/jpeg".to_string(),
        bytes: vec![1, 2, 3],
        fields: Vec::new(),
    };
    api.upload_image(upload.clone(), UploadEncoding::Standard).await.unwrap();
    api.upload_image(upload, UploadEncoding::Raw).await.unwrap();

    let observed: Vec<_> = transport
        .calls()
        .into_iter()
        .map(|c| (format!("{} {}", c.method, c.path), c.timeout))
        .collect();
    let secs = Duration::from_secs;
    assert_eq!(
        observed,
        vec![
            ("POST /auth/login".to_string(), secs(5)),
            ("GET /todos".to_string(), secs(7)),
            ("GET /todos/1".to_string(), secs(10)),
            ("POST /todos".to_string(), secs(10)),
            ("PATCH /todos/1".to_string(), secs(10)),
            ("PATCH /todos/1".to_string(), secs(10)),
            ("DELETE /todos/1".to_string(), secs(10)),
            ("POST /images".to_string(), secs(30)),
            ("POST /images".to_string(), secs(30)),
        ]
    );
}

#[tokio::test]
async fn test_persisted_session_is_loaded_before_first_request() {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY_SESSION_TOKEN, "persisted").await.unwrap();
    let session = Arc::new(SessionContext::new(store));
    let transport = MockTransport::new(|_, _| respond(200, json!([])));
    let api = ApiClient::new(transport.clone(), session.clone());

    api.list_todos().await.unwrap();

    assert!(session.is_initialized());
    assert_eq!(transport.calls()[0].bearer.as_deref(), Some("persisted"));
}
