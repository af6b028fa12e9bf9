//! Fake implementations of the external capabilities

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::guard::Navigator;
use crate::identity::{IdentityError, IdentityVerifier};
use crate::models::Session;
use crate::store::{Document, DocumentStore, Fields, StoreError};

/// Navigator that remembers every redirect
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, location: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(location.to_string());
    }
}

/// Store whose every call fails with a backend error
#[derive(Debug)]
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::Backend {
            status: 503,
            message: self.message.clone(),
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get_document(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
        Err(self.error())
    }

    async fn update_document(&self, _: &str, _: &str, _: Fields) -> Result<(), StoreError> {
        Err(self.error())
    }

    async fn set_document(&self, _: &str, _: &str, _: Fields, _: bool) -> Result<(), StoreError> {
        Err(self.error())
    }
}

/// Verifier that accepts a fixed set of tokens
#[derive(Debug, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, Session>,
}

impl StaticIdentityVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: &str, session: Session) -> Self {
        self.tokens.insert(token.to_string(), session);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<Session, IdentityError> {
        self.tokens
            .get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("INVALID_ID_TOKEN".to_string()))
    }
}

/// Local HTTP/1.1 upstream answering every request with the request head it saw
///
/// Responses carry `x-upstream: echo` and a `ui_pref` cookie so tests can
/// check what the gate relays back.
#[derive(Debug)]
pub struct EchoUpstream {
    url: String,
}

impl EchoUpstream {
    /// Bind an ephemeral localhost port and serve it from a background thread
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound
    #[must_use]
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                Self::answer(stream);
            }
        });
        Self {
            url: format!("http://127.0.0.1:{port}"),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn answer(mut stream: TcpStream) {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }

        let body = String::from_utf8_lossy(&head).into_owned();
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             content-type: text/plain\r\n\
             x-upstream: echo\r\n\
             set-cookie: ui_pref=compact; Path=/\r\n\
             connection: close\r\n\
             content-length: {}\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
    }
}
