//! End-to-end tests: a real server on a Unix socket in a temp dir, driven by
//! the real client.

#![cfg(unix)]

use honeyfs_control::{
    ControlClient, ControlServer, Endpoint, Request, RetryPolicy, ServerConfig,
};
use honeyfs_core::{BusyPolicy, ListFilter};
use honeyfs_namespace::Namespace;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Harness {
    _dir: TempDir,
    endpoint: Endpoint,
    namespace: Arc<Namespace>,
    stop: watch::Sender<bool>,
    task: JoinHandle<honeyfs_core::Result<()>>,
}

impl Harness {
    fn start(policy: BusyPolicy) -> Self {
        let dir = TempDir::new().unwrap();
        let endpoint = Endpoint::from_address(dir.path().join("ctl.sock").to_string_lossy());
        let namespace = Arc::new(Namespace::new());

        let server = ControlServer::bind(
            Arc::clone(&namespace),
            ServerConfig {
                endpoint: endpoint.clone(),
                max_frame_bytes: 64 * 1024,
                busy_policy: policy,
            },
        )
        .unwrap();

        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(server.run(shutdown));
        Self {
            _dir: dir,
            endpoint,
            namespace,
            stop,
            task,
        }
    }

    fn client(&self) -> ControlClient {
        ControlClient::new(self.endpoint.clone()).with_retry(RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(20),
            connect_timeout: Duration::from_secs(1),
            response_timeout: Duration::from_secs(5),
        })
    }

    async fn stop(self) {
        self.stop.send(true).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

fn request(value: serde_json::Value) -> Request {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_create_and_list_scenario() {
    let harness = Harness::start(BusyPolicy::Queue);
    let mut client = harness.client();

    let resp = client
        .send_command(&request(json!({"action": "create_directory", "path": "\\TestMCP"})))
        .await
        .unwrap();
    assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"success": true}));

    let resp = client
        .send_command(&request(json!({
            "action": "create_file",
            "path": "\\TestMCP\\test_file.txt",
            "content": "hello",
            "isBase64": false
        })))
        .await
        .unwrap();
    assert!(resp.success);

    let resp = client
        .send_command(&request(json!({"action": "list_files", "path": "\\TestMCP"})))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&resp).unwrap(),
        json!({"success": true, "data": ["test_file.txt"]})
    );

    assert_eq!(
        harness.namespace.read("/TestMCP/test_file.txt", 0, 5).unwrap(),
        b"hello"
    );
    harness.stop().await;
}

#[tokio::test]
async fn test_delete_scenario() {
    let harness = Harness::start(BusyPolicy::Queue);
    harness
        .namespace
        .create_file("/TestMCP/test_file.txt", b"hello".to_vec())
        .unwrap();
    let mut client = harness.client();

    let rm = json!({"action": "delete_file", "path": "\\TestMCP\\test_file.txt"});
    let resp = client.send_command(&request(rm)).await.unwrap();
    assert!(resp.success);

    let resp = client.list(r"\TestMCP", ListFilter::Files).await.unwrap();
    assert_eq!(
        serde_json::to_value(&resp).unwrap(),
        json!({"success": true, "data": []})
    );
    harness.stop().await;
}

#[tokio::test]
async fn test_missing_directory_scenario() {
    let harness = Harness::start(BusyPolicy::Queue);
    let mut client = harness.client();

    let resp = tokio::time::timeout(
        Duration::from_secs(5),
        client.send_command(&request(json!({"action": "list_all", "path": "\\nonexistent"}))),
    )
    .await
    .expect("server must answer")
    .unwrap();

    assert!(!resp.success);
    assert!(resp.message.is_some());
    assert!(resp.data.is_none());

    // The connection survives a rejection.
    assert!(client.is_connected());
    assert!(client.list("/", ListFilter::All).await.unwrap().success);
    harness.stop().await;
}

#[tokio::test]
async fn test_binary_content_round_trip() {
    let harness = Harness::start(BusyPolicy::Queue);
    let mut client = harness.client();
    let body = [0x00, 0x9f, 0x92, 0x96, 0xff];

    assert!(client.create_file("/keys/blob.bin", &body).await.unwrap().success);
    assert_eq!(harness.namespace.read("/keys/blob.bin", 0, 16).unwrap(), body);
    harness.stop().await;
}

#[tokio::test]
async fn test_queue_policy_serves_second_client_after_first() {
    let harness = Harness::start(BusyPolicy::Queue);
    let mut first = harness.client();
    assert!(first.create_directory("/one").await.unwrap().success);

    let mut second = harness.client();
    let pending = tokio::spawn(async move { second.create_directory("/two").await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());
    assert!(!harness.namespace.exists("/two"));

    first.disconnect();
    let resp = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(resp.success);
    assert!(harness.namespace.exists("/two"));
    harness.stop().await;
}

#[tokio::test]
async fn test_queued_client_gives_up_after_response_timeout() {
    let harness = Harness::start(BusyPolicy::Queue);
    let mut first = harness.client();
    assert!(first.create_directory("/held").await.unwrap().success);

    let mut second = ControlClient::new(harness.endpoint.clone()).with_retry(RetryPolicy {
        attempts: 2,
        delay: Duration::from_millis(10),
        connect_timeout: Duration::from_secs(1),
        response_timeout: Duration::from_millis(100),
    });
    let err = tokio::time::timeout(Duration::from_secs(5), second.list("/", ListFilter::All))
        .await
        .expect("queued client must give up on its own")
        .unwrap_err();
    assert!(err.is_transport_error());
    assert!(!second.is_connected());

    assert!(first.list("/", ListFilter::All).await.unwrap().success);
    harness.stop().await;
}

#[tokio::test]
async fn test_refuse_policy_reports_busy_as_transport_error() {
    let harness = Harness::start(BusyPolicy::Refuse);
    let mut first = harness.client();
    assert!(first.create_directory("/held").await.unwrap().success);

    let mut second = harness.client();
    let err = second.create_directory("/blocked").await.unwrap_err();
    assert!(err.is_transport_error());
    assert!(!harness.namespace.exists("/blocked"));

    first.disconnect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(second.create_directory("/blocked").await.unwrap().success);
    harness.stop().await;
}

#[tokio::test]
async fn test_client_reconnects_after_server_restart() {
    let dir = TempDir::new().unwrap();
    let endpoint = Endpoint::from_address(dir.path().join("restart.sock").to_string_lossy());
    let namespace = Arc::new(Namespace::new());
    let config = ServerConfig {
        endpoint: endpoint.clone(),
        max_frame_bytes: 64 * 1024,
        busy_policy: BusyPolicy::Queue,
    };

    let (stop, shutdown) = watch::channel(false);
    let server = ControlServer::bind(Arc::clone(&namespace), config.clone()).unwrap();
    let task = tokio::spawn(server.run(shutdown));

    let mut client = ControlClient::new(endpoint).with_retry(RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(1),
        response_timeout: Duration::from_secs(5),
    });
    assert!(client.create_directory("/before").await.unwrap().success);

    stop.send(true).unwrap();
    task.await.unwrap().unwrap();

    let (stop, shutdown) = watch::channel(false);
    let server = ControlServer::bind(Arc::clone(&namespace), config).unwrap();
    let task = tokio::spawn(server.run(shutdown));

    assert!(client.create_directory("/after").await.unwrap().success);
    assert!(namespace.exists("/after"));

    stop.send(true).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_removes_socket() {
    let harness = Harness::start(BusyPolicy::Queue);
    let path = std::path::PathBuf::from(harness.endpoint.address());
    assert!(path.exists());

    let Harness { _dir: dir, stop, task, .. } = harness;
    stop.send(true).unwrap();
    task.await.unwrap().unwrap();
    assert!(!path.exists());
    assert!(dir.path().exists());
}

#[tokio::test]
async fn test_unreachable_service() {
    let dir = TempDir::new().unwrap();
    let endpoint = Endpoint::from_address(dir.path().join("nobody.sock").to_string_lossy());
    let mut client = ControlClient::new(endpoint).with_retry(RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(10),
        connect_timeout: Duration::from_millis(100),
        response_timeout: Duration::from_millis(100),
    });

    let err = client.create_directory("/x").await.unwrap_err();
    assert!(err.is_transport_error());
}
