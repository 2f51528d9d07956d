#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use termrc::protocol::RcResponse;
use termrc::rc::CommandRegistry;
use termrc::window::{WindowRegistry, WindowSpec};

/// A socket server running on a temporary path.
pub struct TestServer {
    /// Keeps the socket directory alive for the test.
    _dir: TempDir,
    pub path: PathBuf,
    pub boss: WindowRegistry,
    pub responses: mpsc::UnboundedReceiver<RcResponse>,
    pub cancel: CancellationToken,
    pub handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

pub fn spec(title: &str) -> WindowSpec {
    WindowSpec {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Start a server with one window per title and wait for its socket.
pub async fn start_test_server(titles: &[&str]) -> TestServer {
    let boss = WindowRegistry::new();
    for t in titles {
        boss.open(spec(t));
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rc.sock");
    let (tx, responses) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let handle = {
        let boss = boss.clone();
        let path = path.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            termrc::server::serve(
                Arc::new(CommandRegistry::builtin()),
                boss,
                &path,
                cancel,
                Some(tx),
            )
            .await
        })
    };

    // Wait for socket to appear
    for _ in 0..50 {
        if path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(path.exists(), "server socket should exist at {:?}", path);

    TestServer {
        _dir: dir,
        path,
        boss,
        responses,
        cancel,
        handle,
    }
}

pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
