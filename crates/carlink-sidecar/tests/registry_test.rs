use axum::http::Method;
use carlink_core::{ServiceDescriptor, ServiceNode, SidecarError};
use serde_json::json;
use std::time::Duration;

mod common;

fn greeter() -> ServiceDescriptor {
    ServiceDescriptor::with_node(
        "go.micro.srv.greeter",
        ServiceNode::new("go.micro.srv.greeter-1", "127.0.0.1", 9090),
    )
}

#[tokio::test]
async fn test_register_then_deregister_sends_same_body() {
    let (sidecar, client, _handle) = common::start().await;
    let service = greeter();

    let registered = client.register(&service).await.unwrap();
    let deregistered = client.deregister(&service).await.unwrap();
    assert!(registered.is_success());
    assert!(deregistered.is_success());

    let requests = sidecar.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[0].path, "/registry");
    assert_eq!(requests[1].path, "/registry");
    assert_eq!(requests[0].body, requests[1].body);

    for request in &requests {
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
    }

    let sent: ServiceDescriptor = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent, service);
}

#[tokio::test]
async fn test_register_with_ttl_passes_query() {
    let (sidecar, client, _handle) = common::start().await;

    client
        .register_with_ttl(&greeter(), Duration::from_secs(30))
        .await
        .unwrap();

    let requests = sidecar.requests();
    assert_eq!(requests[0].query.as_deref(), Some("ttl=30s"));
}

#[tokio::test]
async fn test_register_failure_is_surfaced() {
    let (sidecar, client, _handle) = common::start().await;
    sidecar.respond("/registry", 500, "registry unavailable");

    let err = client.register(&greeter()).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), Some(500));
    assert_eq!(sidecar.requests().len(), 1);
}

#[tokio::test]
async fn test_register_unreachable_sidecar() {
    let client = common::unreachable_client().await;

    let err = client.register(&greeter()).await.unwrap_err();
    assert!(matches!(err, SidecarError::Transport(_)));
}

#[tokio::test]
async fn test_get_service_queries_by_name() {
    let (sidecar, client, _handle) = common::start().await;
    sidecar.respond(
        "/registry",
        200,
        &json!([{"name": "go.micro.srv.greeter", "version": "latest", "nodes": []}]).to_string(),
    );

    let services = client.get_service("go.micro.srv.greeter").await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name(), Some("go.micro.srv.greeter"));
    assert_eq!(services[0].get("version"), Some(&json!("latest")));

    let requests = sidecar.requests();
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].query.as_deref(), Some("service=go.micro.srv.greeter"));
}

#[tokio::test]
async fn test_get_unknown_service_is_empty() {
    let (sidecar, client, _handle) = common::start().await;
    sidecar.respond("/registry", 404, "Service not found");

    let services = client.get_service("go.micro.srv.missing").await.unwrap();
    assert!(services.is_empty());
}

#[tokio::test]
async fn test_get_service_rejects_empty_name() {
    let (sidecar, client, _handle) = common::start().await;

    let err = client.get_service("").await.unwrap_err();
    assert!(matches!(err, SidecarError::InvalidRequest(_)));
    assert!(sidecar.requests().is_empty());
}

#[tokio::test]
async fn test_list_services() {
    let (sidecar, client, _handle) = common::start().await;
    sidecar.respond(
        "/registry",
        200,
        r#"[{"name":"go.micro.srv.greeter"},{"name":"go.micro.srv.auth"}]"#,
    );

    let services = client.list_services().await.unwrap();
    let names: Vec<_> = services.iter().filter_map(|s| s.name()).collect();
    assert_eq!(names, vec!["go.micro.srv.greeter", "go.micro.srv.auth"]);
    assert_eq!(sidecar.requests()[0].query, None);
}

#[tokio::test]
async fn test_list_services_null_body_is_empty() {
    let (sidecar, client, _handle) = common::start().await;
    sidecar.respond("/registry", 200, "null");

    assert!(client.list_services().await.unwrap().is_empty());
}
