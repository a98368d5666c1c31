//! Drives an in-process service through the `ctl` command path and reads
//! the result back through the projection adapter.

#![cfg(unix)]

use honeyfs_cli::{CtlAction, ServeArgs};
use honeyfs_cli::commands::{ctl, serve};
use honeyfs_control::{ControlClient, Endpoint, RetryPolicy};
use honeyfs_core::ServiceConfig;
use honeyfs_core::cli::{ExitCode, OutputFormat};
use honeyfs_projection::FilesystemOps;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

fn config(dir: &TempDir) -> ServiceConfig {
    let manifest = dir.path().join("decoys.json");
    std::fs::write(
        &manifest,
        r#"{"files": [
            {"path": "/Finance/payroll.xlsx", "content": "cGF5cm9sbA==", "isBase64": true},
            {"path": "/Finance/Archive", "directory": true}
        ]}"#,
    )
    .unwrap();

    let mut config = ServiceConfig::default();
    serve::apply_overrides(
        &mut config,
        ServeArgs {
            endpoint: Some(dir.path().join("ctl.sock").to_string_lossy().into_owned()),
            manifest: Some(manifest),
            mountpoint: None,
        },
    );
    config
}

fn client(config: &ServiceConfig) -> ControlClient {
    ControlClient::new(Endpoint::resolve(&config.control.endpoint)).with_retry(RetryPolicy {
        attempts: 2,
        delay: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(1),
        response_timeout: Duration::from_secs(5),
    })
}

async fn ctl_text(client: &mut ControlClient, action: CtlAction) -> (ExitCode, String) {
    let mut out = Vec::new();
    let code = ctl::execute(client, &action, OutputFormat::Text, &mut out)
        .await
        .unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_serve_then_reshape_over_ctl() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = serve::Service::start(&config).unwrap();
    let adapter = service.adapter();
    let socket = PathBuf::from(service.endpoint().address());

    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(service.run_until(async {
        let _ = stopped.await;
    }));

    let mut client = client(&config);

    let (code, out) = ctl_text(
        &mut client,
        CtlAction::Ls {
            path: "/Finance".to_string(),
            files: false,
            dirs: false,
        },
    )
    .await;
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(out, "Archive\npayroll.xlsx\n");

    let (code, _) = ctl_text(
        &mut client,
        CtlAction::Mkdir {
            path: r"\TestMCP".to_string(),
        },
    )
    .await;
    assert_eq!(code, ExitCode::SUCCESS);

    let (code, _) = ctl_text(
        &mut client,
        CtlAction::Put {
            path: r"\TestMCP\test_file.txt".to_string(),
            content: Some("hello".to_string()),
            from_file: None,
            base64: false,
        },
    )
    .await;
    assert_eq!(code, ExitCode::SUCCESS);

    // The projected view sees the control channel's change immediately.
    let fh = adapter.open("/TestMCP/test_file.txt").unwrap();
    assert_eq!(adapter.read("/TestMCP/test_file.txt", 64, 0, Some(fh)).unwrap(), b"hello");
    adapter.release("/TestMCP/test_file.txt", fh).unwrap();
    assert_eq!(adapter.read("/Finance/payroll.xlsx", 64, 0, None).unwrap(), b"payroll");

    let (code, out) = ctl_text(
        &mut client,
        CtlAction::Rm {
            path: "/Finance".to_string(),
        },
    )
    .await;
    assert_eq!(code, ExitCode::REJECTED);
    assert!(out.starts_with("error: "));

    stop.send(()).unwrap();
    running.await.unwrap().unwrap();
    assert!(!socket.exists());

    let (code, out) = ctl_text(
        &mut client,
        CtlAction::Mkdir {
            path: "/late".to_string(),
        },
    )
    .await;
    assert_eq!(code, ExitCode::TRANSPORT);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_second_service_on_same_endpoint_fails() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let _first = serve::Service::start(&config).unwrap();

    let err = serve::Service::start(&config).unwrap_err();
    let source = err.downcast_ref::<honeyfs_core::Error>().unwrap();
    assert!(source.is_transport_error());
}

#[tokio::test]
async fn test_bad_manifest_fails_startup() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    let manifest = dir.path().join("broken.json");
    std::fs::write(&manifest, "{ files: ").unwrap();
    config.namespace.manifest = Some(manifest);

    let err = serve::Service::start(&config).unwrap_err();
    assert!(err.downcast_ref::<honeyfs_core::Error>().unwrap().is_config_error());
    assert!(!PathBuf::from(&config.control.endpoint).exists());
}
