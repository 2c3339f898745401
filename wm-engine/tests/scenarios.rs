//! End-to-end scenarios S1–S7, each built from the public `Application` API
//! and asserted against the returned `Response`.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use wm_contract::dependency::{DependencyKind, Scope};
use wm_contract::value::downcast;
use wm_contract::{
    AnyValue, AuthDecision, ContractError, DependencyDescriptor, HandlerReturn, Method, Request,
    ResourceState,
};
use wm_engine::{Application, RouteBuilder};

fn json_renderer() -> wm_engine::RendererFn {
    Arc::new(|value, _request| {
        let json: Arc<serde_json::Value> = downcast(value, "serde_json::Value")
            .map_err(|e| ContractError::underlying("renderer", e.to_string()))?;
        Ok(serde_json::to_vec(&*json).unwrap())
    })
}

fn json_parser() -> wm_engine::ParserFn {
    Arc::new(|bytes| {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| ContractError::underlying("parser", e.to_string()))?;
        Ok(Arc::new(value) as AnyValue)
    })
}

fn app_with_json() -> Application {
    let mut app = Application::new();
    app.default_renderer("application/json", json_renderer());
    app
}

#[tokio::test]
async fn s1_simple_get() {
    let mut app = app_with_json();
    app.route(
        RouteBuilder::get("/hello", Vec::<String>::new(), |_args| {
            Box::pin(async { Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({"message": "Hello, World!"})))) })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

    let resp = app
        .execute(Request::new(Method::Get, "/hello").with_header("Accept", "application/json"))
        .await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.get("content-type"), Some("application/json"));
    assert_eq!(
        resp.body,
        serde_json::to_vec(&serde_json::json!({"message": "Hello, World!"})).unwrap()
    );
}

#[tokio::test]
async fn s2_case_insensitive_authorization() {
    let mut app = app_with_json();
    app.dependency(
        DependencyDescriptor::new("auth", Scope::Request, DependencyKind::Authorization)
            .with_params(vec!["request_headers"]),
        Arc::new(|args| {
            Box::pin(async move {
                let headers: Arc<wm_contract::CaseInsensitiveMultiMap> =
                    downcast(&args[0], "headers")?;
                Ok(Arc::new(if headers.get("authorization") == Some("Bearer t") {
                    AuthDecision::Granted
                } else {
                    AuthDecision::Denied { www_authenticate: Some("Bearer".to_string()) }
                }) as AnyValue)
            })
        }),
    )
    .unwrap();
    app.route(
        RouteBuilder::get("/secret", Vec::<String>::new(), |_args| {
            Box::pin(async { Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({"ok": true})))) })
        })
        .authorized("auth")
        .build()
        .unwrap(),
    )
    .unwrap();

    let granted = app
        .execute(Request::new(Method::Get, "/secret").with_header("authorization", "Bearer t"))
        .await;
    assert_eq!(granted.status, 200);

    let denied = app.execute(Request::new(Method::Get, "/secret")).await;
    assert_eq!(denied.status, 401);
    assert_eq!(denied.headers.get("www-authenticate"), Some("Bearer"));
}

#[tokio::test]
async fn s3_conditional_get_with_matching_etag() {
    let mut app = app_with_json();
    app.dependency(
        DependencyDescriptor::new("item", Scope::Request, DependencyKind::ResourceExistence),
        Arc::new(|_args| {
            Box::pin(async {
                Ok(Arc::new(ResourceState::Exists(
                    Arc::new(serde_json::json!({"id": "1", "v": 1})) as AnyValue,
                )) as AnyValue)
            })
        }),
    )
    .unwrap();
    app.dependency(
        DependencyDescriptor::new("item_etag", Scope::Request, DependencyKind::EtagProvider)
            .with_params(vec!["item"]),
        Arc::new(|_args| Box::pin(async { Ok(Arc::new("\"1\"".to_string()) as AnyValue) })),
    )
    .unwrap();
    app.route(
        RouteBuilder::get("/item/{id}", Vec::<String>::new(), |_args| {
            Box::pin(async { Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({"id": "1", "v": 1})))) })
        })
        .resource_exists("item")
        .etag("item_etag")
        .build()
        .unwrap(),
    )
    .unwrap();

    let resp = app
        .execute(Request::new(Method::Get, "/item/1").with_header("If-None-Match", "\"1\""))
        .await;

    assert_eq!(resp.status, 304);
    assert!(resp.body.is_empty());
    assert_eq!(resp.headers.get("etag"), Some("\"1\""));
}

#[tokio::test]
async fn s4_content_negotiation_fallback() {
    let mut app = app_with_json();
    app.route(
        RouteBuilder::get("/data", Vec::<String>::new(), |_args| {
            Box::pin(async { Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({"n": 1})))) })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

    let rejected = app
        .execute(Request::new(Method::Get, "/data").with_header("Accept", "text/html"))
        .await;
    assert_eq!(rejected.status, 406);

    let accepted = app
        .execute(
            Request::new(Method::Get, "/data")
                .with_header("Accept", "text/html, application/json;q=0.5"),
        )
        .await;
    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.headers.get("content-type"), Some("application/json"));
}

#[tokio::test]
async fn s5_post_with_validator_failure() {
    let mut app = app_with_json();
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let handler_calls_clone = Arc::clone(&handler_calls);

    app.dependency(
        DependencyDescriptor::new("name_valid", Scope::Request, DependencyKind::Validator)
            .with_params(vec!["json_body"]),
        Arc::new(|args| {
            Box::pin(async move {
                let body: Arc<serde_json::Value> = downcast(&args[0], "json_body")?;
                let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    return Err(ContractError::Validation {
                        status: 422,
                        message: "name must be non-empty".to_string(),
                    });
                }
                Ok(Arc::new(name.to_string()) as AnyValue)
            })
        }),
    )
    .unwrap();
    app.route(
        RouteBuilder::post("/users", Vec::<String>::new(), move |_args| {
            let handler_calls = Arc::clone(&handler_calls_clone);
            Box::pin(async move {
                handler_calls.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({"created": true}))))
            })
        })
        .validator("name_valid")
        .parser("application/json", json_parser())
        .build()
        .unwrap(),
    )
    .unwrap();

    let resp = app
        .execute(
            Request::new(Method::Post, "/users")
                .with_header("Content-Type", "application/json")
                .with_body(br#"{"name":""}"#.to_vec()),
        )
        .await;

    assert_eq!(resp.status, 422);
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn s6_method_mismatch() {
    let mut app = app_with_json();
    app.route(
        RouteBuilder::get("/x", Vec::<String>::new(), |_args| {
            Box::pin(async { Ok(HandlerReturn::Empty) })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

    let resp = app.execute(Request::new(Method::Post, "/x")).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.headers.get("allow"), Some("GET"));
}

#[tokio::test]
async fn s7_startup_dependency_reuse() {
    let mut app = app_with_json();
    app.on_startup(
        "db",
        Vec::<String>::new(),
        Arc::new(|_args| Box::pin(async { Ok(Arc::new(AtomicI64::new(0)) as AnyValue) })),
    );
    app.route(
        RouteBuilder::get("/count", vec!["db"], |args| {
            Box::pin(async move {
                let db: Arc<AtomicI64> = downcast(&args[0], "db")?;
                let next = db.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(HandlerReturn::Bare(Arc::new(serde_json::json!(next))))
            })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

    app.startup().await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let resp = app.execute(Request::new(Method::Get, "/count")).await;
        assert_eq!(resp.status, 200);
        seen.push(String::from_utf8(resp.body).unwrap());
    }
    assert_eq!(seen, vec!["1", "2", "3"]);
}
