//! In-process http stub standing in for mangadex during tests.

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

pub static PAGE_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

pub static PAGE_JPG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F', 0, 0xFF, 0xD9];

/// Serves fixed bodies by path and records every requested path.
/// Unknown paths get a 404.
pub struct StubServer {
    base: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, Vec<u8>)>) -> Self {
        Self::start_with_status(
            routes
                .into_iter()
                .map(|(path, body)| (path, 200, body))
                .collect(),
        )
    }

    /// Like `start`, with the status code of each route given.
    pub fn start_with_status(routes: Vec<(&str, u16, Vec<u8>)>) -> Self {
        let routes: HashMap<String, (u16, Vec<u8>)> = routes
            .into_iter()
            .map(|(path, code, body)| (path.to_string(), (code, body)))
            .collect();
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base = format!("http://{}", server.server_addr());
        let hits = Arc::new(Mutex::new(Vec::new()));
        let (shutdown, shutdown_rx) = mpsc::channel::<()>();

        let recorded = Arc::clone(&hits);
        let handle = thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let path = request.url().to_string();
            recorded.lock().expect("hits lock").push(path.clone());
            let response = match routes.get(&path) {
                Some((code, body)) => {
                    tiny_http::Response::from_data(body.clone()).with_status_code(*code)
                }
                None => tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        });

        Self {
            base,
            hits,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn base(&self) -> String {
        self.base.clone()
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().expect("hits lock").clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
