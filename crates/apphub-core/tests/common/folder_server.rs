//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves in-memory files keyed by request path (query string ignored) and
//! answers 404 for anything else. Every request line is recorded so tests can
//! inspect what the client asked for.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Accept connections but never answer (exercises transfer timeouts).
    pub stall: bool,
    /// Answer every request with this status and an empty body.
    pub fixed_status: Option<u16>,
}

pub struct FolderServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FolderServer {
    /// `files` maps a raw (percent-encoded) path such as `/apps/x.zip` to its body.
    pub fn start(files: Vec<(String, Vec<u8>)>) -> Self {
        Self::start_with_options(files, ServerOptions::default())
    }

    pub fn start_with_options(files: Vec<(String, Vec<u8>)>, opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(files.into_iter().collect());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let files = Arc::clone(&files);
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, &files, &log, opts));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}"),
            requests,
        }
    }

    /// `http://127.0.0.1:<port>` without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Request targets seen so far (path plus query).
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    files: &HashMap<String, Vec<u8>>,
    log: &Mutex<Vec<String>>,
    opts: ServerOptions,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let Some(target) = read_request_target(&mut stream) else {
        return;
    };
    log.lock().unwrap().push(target.clone());

    if opts.stall {
        thread::sleep(Duration::from_secs(30));
        return;
    }
    if let Some(code) = opts.fixed_status {
        let _ = write!(stream, "HTTP/1.1 {code} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let path = target.split('?').next().unwrap_or("");
    match files.get(path) {
        Some(body) => {
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(body);
        }
        None => {
            let body = b"not found";
            let _ = write!(
                stream,
                "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(body);
        }
    }
}

/// Read the request head and return the target of the request line.
fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        head.extend_from_slice(&buf[..n]);
        if head.len() > 64 * 1024 {
            return None;
        }
    }
    let text = String::from_utf8_lossy(&head);
    let request_line = text.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}
