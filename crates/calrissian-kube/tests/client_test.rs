//! REST client tests against a mock API server.

use calrissian_kube::types::ConfigMap;
use calrissian_kube::{ClusterApi, CustomResource, KubeClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> KubeClient {
    KubeClient::builder()
        .base_url(server.uri())
        .bearer_token("t0ken")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_config_map_posts_to_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/calrissian/configmaps"))
        .and(header("authorization", "Bearer t0ken"))
        .and(body_partial_json(json!({
            "metadata": {"name": "params-42"},
            "data": {"params": "message: hello\n"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "params-42", "namespace": "calrissian", "uid": "abc"},
            "data": {"params": "message: hello\n"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cm = ConfigMap::single("params-42", "calrissian", "params", "message: hello\n");
    let created = client.create_config_map("calrissian", &cm).await.unwrap();
    assert_eq!(created.metadata.uid.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_conflict_and_not_found_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/ns/configmaps"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "kind": "Status",
            "status": "Failure",
            "message": "configmaps \"params-1\" already exists",
            "reason": "AlreadyExists",
            "code": 409
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/ns/persistentvolumeclaims/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "kind": "Status",
            "message": "persistentvolumeclaims \"missing\" not found",
            "reason": "NotFound",
            "code": 404
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cm = ConfigMap::single("params-1", "ns", "params", "{}");
    let err = client.create_config_map("ns", &cm).await.unwrap_err();
    assert!(err.is_conflict());

    let err = client
        .read_persistent_volume_claim("ns", "missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_forbidden_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/batch/v1/namespaces/ns/jobs/job-1/status"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "kind": "Status",
            "message": "jobs.batch is forbidden",
            "reason": "Forbidden",
            "code": 403
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.read_job_status("ns", "job-1").await.unwrap_err();
    assert!(err.is_auth_error());
    match err {
        calrissian_kube::Error::Api { status, reason, .. } => {
            assert_eq!(status, 403);
            assert_eq!(reason, "Forbidden");
        }
        other => panic!("Expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_read_job_status_parses_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/batch/v1/namespaces/ns/jobs/job-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "job-1"},
            "status": {
                "succeeded": 1,
                "startTime": "2024-05-01T10:00:00Z",
                "completionTime": "2024-05-01T10:07:30Z"
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = client.read_job_status("ns", "job-1").await.unwrap();
    let status = job.status.unwrap();
    assert_eq!(status.succeeded, Some(1));
    assert!(status.active.is_none());
    assert!(status.completion_time.is_some());
}

#[tokio::test]
async fn test_list_pods_sends_selector_and_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/ns/pods"))
        .and(query_param("labelSelector", "job-name=job-1"))
        .and(query_param("timeoutSeconds", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "PodList",
            "items": [{"metadata": {"name": "job-1-x7k2p"}, "status": {"phase": "Running"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let pods = client.list_pods("ns", "job-name=job-1").await.unwrap();
    assert_eq!(pods.items.len(), 1);
    assert_eq!(pods.items[0].metadata.name.as_deref(), Some("job-1-x7k2p"));
}

#[tokio::test]
async fn test_read_pod_log_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/ns/pods/job-1-x7k2p/log"))
        .and(query_param("container", "calrissian"))
        .respond_with(ResponseTemplate::new(200).set_body_string("INFO starting\nINFO done\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let log = client
        .read_pod_log("ns", "job-1-x7k2p", "calrissian")
        .await
        .unwrap();
    assert_eq!(log, "INFO starting\nINFO done\n");
}

#[tokio::test]
async fn test_delete_job_propagates_in_background() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/apis/batch/v1/namespaces/ns/jobs/job-1"))
        .and(body_partial_json(json!({"propagationPolicy": "Background"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Status"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.delete_job("ns", "job-1").await.unwrap();
}

#[tokio::test]
async fn test_get_custom_object_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/core.telespazio-uk.io/v1alpha1/namespaces/workspaces/workspaces/ws-alice",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"name": "ws-alice"},
            "spec": {"storage": {"persistentVolumes": []}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let resource = CustomResource::new("core.telespazio-uk.io", "v1alpha1", "workspaces");
    let object = client
        .get_custom_object(&resource, "workspaces", "ws-alice")
        .await
        .unwrap();
    assert_eq!(object["metadata"]["name"], "ws-alice");
}
