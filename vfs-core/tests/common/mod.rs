//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use vfs_core::{
    VfsResult,
    net::{
        HttpClient, HttpResponse,
        http::Headers,
    },
};

/// Canned responses by exact URL; anything else is a 404.
#[derive(Default, Clone)]
pub struct FakeServer {
    routes: Arc<Mutex<HashMap<String, (u16, Bytes)>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.into()));
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, url: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClient for FakeServer {
    async fn get(&self, url: &Url, _headers: &Headers) -> VfsResult<HttpResponse> {
        let key = url.to_string();
        self.hits.lock().unwrap().push(key.clone());

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or((404, Bytes::from_static(b"not found")));

        Ok(HttpResponse {
            status,
            url: key,
            body,
        })
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}
