//! Server tests over real sockets: in-memory collaborators behind the gate,
//! a stub queue processor behind the scheduled trigger.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use portcullis_config::PortcullisConfig;
use portcullis_core::{fixtures, Role};
use portcullis_identity::InMemoryIdentityProvider;
use portcullis_membership::InMemoryMembershipStore;
use portcullis_server::{App, Server, ShutdownSignal};
use reqwest::header::{AUTHORIZATION, LOCATION, SET_COOKIE};
use reqwest::{Client, StatusCode};
use tokio::net::TcpListener;

const SECRET: &str = "queue-secret";

type Seen = Arc<Mutex<Vec<Option<String>>>>;

async fn spawn_queue_processor(seen: Seen) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let seen = seen.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let seen = seen.clone();
                    async move {
                        let auth = req
                            .headers()
                            .get(AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let authorized = auth.as_deref() == Some("Bearer queue-secret");
                        seen.lock().push(auth);

                        let response = if req.uri().path() == "/api/internal/process-queue"
                            && req.method() == hyper::Method::POST
                            && authorized
                        {
                            hyper::Response::builder()
                                .status(202)
                                .body(Full::new(Bytes::from(r#"{"processed":3}"#)))
                        } else {
                            hyper::Response::builder()
                                .status(401)
                                .body(Full::new(Bytes::from(r#"{"error":"unauthorized"}"#)))
                        };
                        Ok::<_, Infallible>(response.unwrap())
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

struct TestServer {
    base: String,
    client: Client,
    store: InMemoryMembershipStore,
    seen: Seen,
    shutdown: ShutdownSignal,
    handle: tokio::task::JoinHandle<Result<(), portcullis_server::ServerError>>,
}

async fn start() -> TestServer {
    let seen = Seen::default();
    let upstream = spawn_queue_processor(seen.clone()).await;

    let mut config = PortcullisConfig::default();
    config.scheduler.secret = Some(SECRET.to_string());
    config.scheduler.internal_base_url = format!("http://{upstream}");
    config.scheduler.forward_timeout_ms = 2_000;

    let provider = InMemoryIdentityProvider::new();
    provider.insert_session("tok", fixtures::user());
    let store = InMemoryMembershipStore::new();

    let app = App::with_collaborators(
        &config,
        Arc::new(provider),
        Arc::new(store.clone()),
        Client::new(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(Server::new(app, &config.server).serve(listener, shutdown.clone()));

    TestServer {
        base: format!("http://{addr}"),
        client: Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap(),
        store,
        seen,
        shutdown,
        handle,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let server = start().await;

    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().get(SET_COOKIE).is_none());
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["service"], "portcullis");

    let ready = server.client.get(server.url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_workspace_root_redirects_with_locale_cookie() {
    let server = start().await;

    let response = server.client.get(server.url("/app")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/?next=%2Fapp");
    let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].to_str().unwrap().starts_with("locale=en"));
}

#[tokio::test]
async fn test_onboarded_user_lands_on_inbox() {
    let server = start().await;
    server
        .store
        .insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));

    let response = server
        .client
        .get(server.url("/app/onboarding"))
        .header("cookie", "portcullis-session=tok; locale=en")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/app/inbox");
}

#[tokio::test]
async fn test_cron_header_forwards_with_secret() {
    let server = start().await;

    let response = server
        .client
        .get(server.url("/api/cron/process-queue"))
        .header("x-vercel-cron", "1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["processed"], 3);
    assert_eq!(
        server.seen.lock().as_slice(),
        [Some("Bearer queue-secret".to_string())]
    );
}

#[tokio::test]
async fn test_cron_bearer_secret_is_accepted() {
    let server = start().await;

    let response = server
        .client
        .post(server.url("/api/cron/process-queue"))
        .bearer_auth(SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_cron_without_credentials_is_rejected() {
    let server = start().await;

    for bearer in [None, Some("queue-secreT"), Some("queue")] {
        let mut request = server.client.post(server.url("/api/cron/process-queue"));
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "bearer {bearer:?}");
    }
    assert!(server.seen.lock().is_empty());
}

#[tokio::test]
async fn test_workflow_deletion() {
    let server = start().await;
    server
        .store
        .insert("user-1", fixtures::membership("ws-admin", Role::Admin, 0));
    server
        .store
        .insert("user-1", fixtures::membership("ws-viewer", Role::Viewer, 5));
    server.store.insert_workflow("ws-admin", "wf-1");
    server.store.insert_workflow("ws-viewer", "wf-2");

    let delete = |path: &str| {
        server
            .client
            .delete(server.url(path))
            .header("cookie", "portcullis-session=tok; locale=en")
            .send()
    };

    let response = delete("/api/workflows/wf-1?workspace_id=ws-admin").await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!server.store.has_workflow("ws-admin", "wf-1"));

    let response = delete("/api/workflows/wf-2?workspace_id=ws-viewer").await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(server.store.has_workflow("ws-viewer", "wf-2"));

    let response = delete("/api/workflows/wf-2").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server.store.set_unavailable(true);
    let response = delete("/api/workflows/wf-1?workspace_id=ws-admin").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_anonymous_workflow_deletion_redirects_to_sign_in() {
    let server = start().await;

    let response = server
        .client
        .delete(server.url("/api/workflows/wf-1?workspace_id=ws-1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION],
        "/?next=%2Fapi%2Fworkflows%2Fwf-1%3Fworkspace_id%3Dws-1"
    );
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let server = start().await;
    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
