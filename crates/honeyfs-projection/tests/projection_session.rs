//! A consumer session driven through the callback interface, observed by a
//! throttled alert chain.

use honeyfs_core::ListFilter;
use honeyfs_namespace::NamespaceBuilder;
use honeyfs_projection::{
    AccessEvent, AccessLogger, AccessObserver, AccessOp, Errno, FilesystemOps, ObserverError,
    ProjectionAdapter, ThrottledObserver,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Default)]
struct Alerts(Arc<Mutex<Vec<String>>>);

impl AccessObserver for Alerts {
    fn on_access(&self, event: &AccessEvent) -> Result<(), ObserverError> {
        self.0.lock().push(event.path.clone());
        Ok(())
    }

    fn handles(&self, op: AccessOp) -> bool {
        op == AccessOp::Open
    }
}

fn adapter() -> (ProjectionAdapter, Alerts) {
    let ns = NamespaceBuilder::new()
        .add_file(r"\Finance\payroll_2024.xlsx", vec![0x50, 0x4b, 0x03, 0x04])
        .add_file(r"\IT\vpn\config.ovpn", "remote vpn.corp.local 1194")
        .build()
        .unwrap();

    let alerts = Alerts::default();
    let throttled = ThrottledObserver::new(alerts.clone(), Duration::from_secs(60));
    let logger = AccessLogger::new().with_observer(Arc::new(throttled));
    (ProjectionAdapter::new(Arc::new(ns), logger), alerts)
}

#[test]
fn test_browse_and_copy_session() {
    let (fs, alerts) = adapter();

    let root: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(root, vec![".", "..", "Finance", "IT"]);

    let attr = fs.getattr("/Finance/payroll_2024.xlsx").unwrap();
    assert_eq!(attr.size, 4);

    let fh = fs.open("/Finance/payroll_2024.xlsx").unwrap();
    let mut copied = Vec::new();
    let mut offset = 0;
    loop {
        let chunk = fs
            .read("/Finance/payroll_2024.xlsx", 3, offset, Some(fh))
            .unwrap();
        if chunk.is_empty() {
            break;
        }
        offset += chunk.len() as u64;
        copied.extend(chunk);
    }
    fs.release("/Finance/payroll_2024.xlsx", fh).unwrap();

    assert_eq!(copied, vec![0x50, 0x4b, 0x03, 0x04]);
    assert_eq!(alerts.0.lock().as_slice(), ["/Finance/payroll_2024.xlsx"]);
}

#[test]
fn test_repeated_opens_alert_once() {
    let (fs, alerts) = adapter();
    for _ in 0..5 {
        let fh = fs.open(r"\IT\vpn\config.ovpn").unwrap();
        fs.release("/IT/vpn/config.ovpn", fh).unwrap();
    }
    fs.open("/Finance/payroll_2024.xlsx").unwrap();

    assert_eq!(alerts.0.lock().len(), 2);
}

#[test]
fn test_create_then_open_alerts() {
    let (fs, alerts) = adapter();
    let fh = fs.create("/loot.txt", 0o644).unwrap();
    fs.write("/loot.txt", b"exfil", 0, Some(fh)).unwrap();
    fs.release("/loot.txt", fh).unwrap();
    assert!(alerts.0.lock().is_empty());

    let fh = fs.open("/loot.txt").unwrap();
    fs.read("/loot.txt", 16, 0, Some(fh)).unwrap();
    fs.release("/loot.txt", fh).unwrap();
    assert_eq!(alerts.0.lock().as_slice(), ["/loot.txt"]);
}

#[test]
fn test_created_files_visible_to_namespace() {
    let (fs, _) = adapter();
    let fh = fs.create("/IT/dropped.exe", 0o755).unwrap();
    fs.write("/IT/dropped.exe", b"MZ", 0, Some(fh)).unwrap();
    fs.release("/IT/dropped.exe", fh).unwrap();

    let files = fs
        .namespace()
        .list_children("/IT", ListFilter::Files)
        .unwrap();
    assert_eq!(files, vec!["dropped.exe"]);
}

#[test]
fn test_errors_match_real_filesystem() {
    let (fs, _) = adapter();
    assert_eq!(fs.getattr("/nope").unwrap_err(), Errno::ENOENT);
    assert_eq!(fs.open("/IT/nope").unwrap_err(), Errno::ENOENT);
    assert_eq!(fs.readdir("/IT/vpn/config.ovpn").unwrap_err(), Errno::ENOTDIR);
    assert_eq!(fs.getattr("/a//b").unwrap_err(), Errno::EINVAL);
}

#[test]
fn test_concurrent_readers() {
    let (fs, _) = adapter();
    let fs = Arc::new(fs);

    thread::scope(|s| {
        for _ in 0..8 {
            let fs = Arc::clone(&fs);
            s.spawn(move || {
                for _ in 0..50 {
                    let fh = fs.open("/IT/vpn/config.ovpn").unwrap();
                    let body = fs.read("/IT/vpn/config.ovpn", 64, 0, Some(fh)).unwrap();
                    assert_eq!(body, b"remote vpn.corp.local 1194");
                    fs.release("/IT/vpn/config.ovpn", fh).unwrap();
                }
            });
        }
    });

    assert_eq!(fs.open_handles(), 0);
}
