//! Manual smoke-test binary: wires a handful of routes through
//! `wm_engine::Application` and prints the resulting responses. Not a
//! server — there is no transport I/O here, only direct `execute` calls
//! with hand-built requests, the same way the engine's own integration
//! tests drive it.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use wm_contract::value::downcast;
use wm_contract::{AnyValue, AuthDecision, ContractError, HandlerReturn, Method, Request};
use wm_engine::{Application, RouteBuilder};

fn json_renderer() -> wm_engine::RendererFn {
    Arc::new(|value, _request| {
        let json: Arc<serde_json::Value> = downcast(value, "serde_json::Value")
            .map_err(|e| ContractError::underlying("renderer", e.to_string()))?;
        Ok(serde_json::to_vec(&*json).unwrap())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut app = Application::new();
    app.default_renderer("application/json", json_renderer());

    app.route(
        RouteBuilder::get("/hello", Vec::<String>::new(), |_args| {
            Box::pin(async {
                Ok(HandlerReturn::Bare(Arc::new(
                    serde_json::json!({"message": "Hello, World!"}),
                )))
            })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

    app.dependency(
        wm_contract::DependencyDescriptor::new(
            "auth",
            wm_contract::dependency::Scope::Request,
            wm_contract::dependency::DependencyKind::Authorization,
        )
        .with_params(vec!["request_headers"]),
        Arc::new(|args| {
            Box::pin(async move {
                let headers: Arc<wm_contract::CaseInsensitiveMultiMap> =
                    downcast(&args[0], "headers")?;
                Ok(Arc::new(if headers.get("authorization") == Some("Bearer t") {
                    AuthDecision::Granted
                } else {
                    AuthDecision::Denied {
                        www_authenticate: Some("Bearer".to_string()),
                    }
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

    app.startup().await.expect("startup handlers failed");

    print_response("GET /hello", app.execute(Request::new(Method::Get, "/hello")).await);
    print_response(
        "GET /secret (no auth)",
        app.execute(Request::new(Method::Get, "/secret")).await,
    );
    print_response(
        "GET /secret (Bearer t)",
        app.execute(Request::new(Method::Get, "/secret").with_header("authorization", "Bearer t"))
            .await,
    );
    for _ in 0..3 {
        print_response("GET /count", app.execute(Request::new(Method::Get, "/count")).await);
    }

    app.shutdown().await.expect("shutdown handlers failed");
}

fn print_response(label: &str, response: wm_contract::Response) {
    println!(
        "{label} -> {} {}",
        response.status,
        String::from_utf8_lossy(&response.body)
    );
}
