//! HTTP membership store tests against a local PostgREST-style stub.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use portcullis_core::{GateError, Role, SessionUser, WorkspaceState};
use portcullis_membership::{
    HttpMembershipStore, MembershipResolver, MembershipStore, StoreError, WorkspaceGuard,
};
use tokio::net::TcpListener;

const ROWS: &str = r#"[
  {"workspace_id":"ws-1","role":"admin","created_at":"2024-01-01T00:00:00Z","workspace":{"id":"ws-1","name":"Acme","slug":"acme"}},
  {"workspace_id":"ws-gone","role":"member","created_at":"2024-01-02T00:00:00Z","workspace":null},
  {"workspace_id":"ws-2","role":"viewer","created_at":"2024-01-03T00:00:00Z","workspace":{"id":"ws-2","name":"Beta","slug":"beta"}}
]"#;

const ARRAY_ROWS: &str = r#"[
  {"workspace_id":"ws-1","role":"admin","created_at":"2024-01-01T00:00:00Z","workspace":[{"id":"ws-1","name":"Acme","slug":"acme"}]}
]"#;

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| percent_decode(v))
    })
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap()
}

async fn stub(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let query = req.uri().query().unwrap_or_default().to_string();
    let auth = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let apikey_ok = req.headers().get("apikey").is_some_and(|v| v == "anon-key");

    let response = if !apikey_ok {
        Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Full::new(Bytes::from(r#"{"message":"No API key found"}"#)))
    } else {
        match (req.method(), req.uri().path()) {
            (&Method::GET, "/workspace_members") => {
                let select = query_param(&query, "select").unwrap_or_default();
                let order = query_param(&query, "order").unwrap_or_default();
                let user = query_param(&query, "user_id").unwrap_or_default();
                assert_eq!(select, "workspace_id,role,created_at,workspace:workspaces(id,name,slug)");
                assert_eq!(order, "created_at.asc");

                match user.as_str() {
                    "eq.user-1" if auth == "Bearer access-token-1" => {
                        Response::builder().body(Full::new(Bytes::from(ROWS)))
                    }
                    "eq.user-array" => Response::builder().body(Full::new(Bytes::from(ARRAY_ROWS))),
                    "eq.user-denied" => Response::builder()
                        .status(StatusCode::FORBIDDEN)
                        .body(Full::new(Bytes::from(
                            r#"{"code":"42501","message":"permission denied for table workspace_members"}"#,
                        ))),
                    _ => Response::builder().body(Full::new(Bytes::from("[]"))),
                }
            }
            (&Method::DELETE, "/workflows") => {
                let id = query_param(&query, "id").unwrap_or_default();
                let ws = query_param(&query, "workspace_id").unwrap_or_default();
                if id == "eq.wf-1" && ws == "eq.ws-1" {
                    Response::builder()
                        .status(StatusCode::NO_CONTENT)
                        .body(Full::new(Bytes::new()))
                } else {
                    Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(Full::new(Bytes::from(r#"{"message":"bad filter"}"#)))
                }
            }
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::new())),
        }
    };
    Ok(response.unwrap())
}

async fn spawn_stub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(stub))
                    .await;
            });
        }
    });
    addr
}

async fn store() -> HttpMembershipStore {
    let addr = spawn_stub().await;
    HttpMembershipStore::new(reqwest::Client::new(), format!("http://{addr}"), "anon-key")
}

fn user(id: &str) -> SessionUser {
    SessionUser::new(id)
}

#[tokio::test]
async fn fetches_rows_with_user_token() {
    let store = store().await;
    let rows = store
        .memberships(&portcullis_core::fixtures::user())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].workspace.is_none());
}

#[tokio::test]
async fn resolver_drops_orphans_and_keeps_order() {
    let resolver = MembershipResolver::new(Arc::new(store().await));
    let memberships = resolver
        .list_memberships(&portcullis_core::fixtures::user())
        .await
        .unwrap();

    let ids: Vec<_> = memberships.iter().map(|m| m.workspace_id.as_str()).collect();
    assert_eq!(ids, vec!["ws-1", "ws-2"]);
}

#[tokio::test]
async fn array_shaped_workspace_fails_the_query() {
    let store = store().await;
    let err = store.memberships(&user("user-array")).await.unwrap_err();
    assert!(matches!(err, StoreError::Schema(_)));

    let resolver = MembershipResolver::new(Arc::new(store));
    assert_eq!(
        resolver.workspace_state(&user("user-array")).await,
        WorkspaceState::Unknown
    );
}

#[tokio::test]
async fn policy_rejection_is_a_query_failure() {
    let store = store().await;
    let err = store.memberships(&user("user-denied")).await.unwrap_err();
    assert!(err.is_policy_rejection());
    assert!(err.to_string().contains("permission denied"));

    let resolver = MembershipResolver::new(Arc::new(store));
    assert!(resolver.list_memberships_or_empty(&user("user-denied")).await.is_empty());
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let addr = spawn_stub().await;
    let store = HttpMembershipStore::new(reqwest::Client::new(), format!("http://{addr}"), "wrong");
    let err = store.memberships(&user("user-1")).await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 401, .. }));
}

#[tokio::test]
async fn guard_and_delete_workflow() {
    let store = Arc::new(store().await);
    let guard = WorkspaceGuard::new(MembershipResolver::new(store.clone()));
    let caller = portcullis_core::fixtures::user();

    guard.require(&caller, "ws-1", Role::Admin).await.unwrap();
    let err = guard.require(&caller, "ws-2", Role::Admin).await.unwrap_err();
    assert!(matches!(err, GateError::Forbidden { .. }));

    store.delete_workflow(&caller, "ws-1", "wf-1").await.unwrap();
    let err = store.delete_workflow(&caller, "ws-1", "wf-x").await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 400, .. }));
}
