//! Shared fixtures: a throwaway HTTP server and catalog builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plex_updater::models::Platform;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: format!("status {status}").into_bytes(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Minimal HTTP/1.1 server answering each path with a fixed [`Route`].
///
/// Unknown paths get a 404. The server stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(
            routes.into_iter().map(|(path, route)| (path.to_string(), route)).collect(),
        ));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let routes_clone = Arc::clone(&routes);
        let hits_clone = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes_clone);
                let hits = Arc::clone(&hits_clone);
                tokio::spawn(async move {
                    let _ = serve(stream, routes, hits).await;
                });
            }
        });

        Self {
            addr,
            routes,
            hits,
            handle,
        }
    }

    /// Add or replace the response for `path`.
    pub fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Paths requested so far.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    hits.lock().unwrap().push(path.clone());

    let route = routes.lock().unwrap().get(&path).cloned().unwrap_or_else(|| Route::status(404));
    if let Some(delay) = route.delay {
        tokio::time::sleep(delay).await;
    }

    let reason = match route.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&route.body).await?;
    stream.shutdown().await
}

/// A catalog document with one Debian build for `platform`.
pub fn catalog_json(platform: Platform, version: &str, url: &str, checksum: &str) -> String {
    serde_json::json!({
        "computer": {
            "Linux": {
                "id": "linux",
                "name": "Linux",
                "version": version,
                "releases": [
                    {
                        "label": "Fedora (64-bit)",
                        "build": "linux-x86_64",
                        "distro": "redhat",
                        "url": "http://invalid.example/pms.rpm",
                        "checksum": "0000000000000000000000000000000000000000"
                    },
                    {
                        "label": "Ubuntu",
                        "build": platform.build_id(),
                        "distro": "debian",
                        "url": url,
                        "checksum": checksum
                    }
                ]
            }
        }
    })
    .to_string()
}

/// A `[settings]` table pointing at a test server and a harmless installer.
pub fn settings_toml(catalog_url: &str, download_dir: &Path, installer: &str) -> String {
    format!(
        r#"[settings]
catalog_url = "{catalog_url}"
timeout_secs = 5
download_dir = "{}"
installer_program = "{installer}"
installer_args = []
escalation_program = ""
"#,
        download_dir.display()
    )
}

/// A platform table as the state store writes it.
pub fn platform_toml(platform: Platform, version: &str, checksum: &str, url: &str) -> String {
    format!("\n[{platform}]\nversion = \"{version}\"\nchecksum = \"{checksum}\"\nurl = \"{url}\"\n")
}
