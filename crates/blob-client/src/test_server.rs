//! Minimal HTTP servers for client tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use blockload_protocol::parse_block_list;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    /// Looks up a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn read_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let len: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        method,
        target,
        headers,
        body,
    })
}

async fn respond(stream: &mut TcpStream, status: u16, headers: &[(&str, String)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {status} Status\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    if !headers.iter().any(|(name, _)| *name == "Content-Length") {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.shutdown().await;
}

/// Answers one request with `status` and `body`, handing the request back.
pub async fn capture_server(
    status: u16,
    body: &str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}");
    let body = body.to_string();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            if let Some(req) = read_request(&mut stream).await {
                respond(&mut stream, status, &[], body.as_bytes()).await;
                let _ = tx.send(req);
            }
        }
    });

    (url, rx)
}

#[derive(Default)]
struct BlobState {
    uncommitted: HashMap<String, Vec<u8>>,
    committed: Option<(Vec<u8>, String, usize)>,
}

/// In-memory block blob endpoint holding a single object.
pub struct BlobServer {
    base: String,
    state: Arc<Mutex<BlobState>>,
    handle: JoinHandle<()>,
}

impl BlobServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(BlobState::default()));

        let shared = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let state = shared.clone();
                tokio::spawn(async move {
                    if let Some(req) = read_request(&mut stream).await {
                        let (status, headers, body) = handle_request(&state, req);
                        respond(&mut stream, status, &headers, &body).await;
                    }
                });
            }
        });

        Self {
            base: format!("http://127.0.0.1:{port}"),
            state,
            handle,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base, path_and_query)
    }

    /// Number of uploaded blocks not yet part of a commit.
    pub fn uncommitted(&self) -> usize {
        self.state.lock().unwrap().uncommitted.len()
    }
}

impl Drop for BlobServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Reply = (u16, Vec<(&'static str, String)>, Vec<u8>);

fn handle_request(state: &Mutex<BlobState>, req: CapturedRequest) -> Reply {
    let url = Url::parse(&format!("http://test{}", req.target)).unwrap();
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let mut state = state.lock().unwrap();

    match (req.method.as_str(), query.get("comp").map(String::as_str)) {
        ("PUT", Some("block")) => {
            let Some(id) = query.get("blockid") else {
                return (400, vec![], b"missing blockid".to_vec());
            };
            state.uncommitted.insert(id.clone(), req.body);
            (201, vec![], vec![])
        }
        ("PUT", Some("blocklist")) => {
            let xml = String::from_utf8_lossy(&req.body).to_string();
            let Ok(ids) = parse_block_list(&xml) else {
                return (400, vec![], b"InvalidXmlDocument".to_vec());
            };
            let mut data = Vec::new();
            for id in &ids {
                match state.uncommitted.get(&id.encoded()) {
                    Some(block) => data.extend_from_slice(block),
                    None => return (400, vec![], b"InvalidBlockList".to_vec()),
                }
            }
            let content_type = req
                .header("x-ms-blob-content-type")
                .unwrap_or("application/octet-stream")
                .to_string();
            state.uncommitted.clear();
            state.committed = Some((data, content_type, ids.len()));
            (201, vec![], vec![])
        }
        ("GET", None) => {
            let Some((data, _, _)) = &state.committed else {
                return (404, vec![], b"BlobNotFound".to_vec());
            };
            match req.header("x-ms-range").and_then(parse_range) {
                Some((start, end)) => {
                    let end = (end + 1).min(data.len());
                    if start >= end {
                        return (416, vec![], vec![]);
                    }
                    (206, vec![], data[start..end].to_vec())
                }
                None => (200, vec![], data.clone()),
            }
        }
        ("HEAD", None) => {
            let Some((data, content_type, count)) = &state.committed else {
                return (404, vec![], vec![]);
            };
            // HEAD advertises the object length without sending it.
            let headers = vec![
                ("Content-Type", content_type.clone()),
                ("ETag", "\"0x8DTEST\"".to_string()),
                ("x-ms-blob-type", "BlockBlob".to_string()),
                ("x-ms-blob-committed-block-count", count.to_string()),
                ("Content-Length", data.len().to_string()),
            ];
            (200, headers, vec![])
        }
        _ => (400, vec![], b"unsupported".to_vec()),
    }
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}
