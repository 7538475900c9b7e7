use std::{ops::Deref, sync::Arc};

use bytes::Bytes;
use reqwest::{Client, ClientBuilder, IntoUrl, Url};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use tokio_util::sync::CancellationToken;

use crate::error::{HlsError, HlsResult};

/// HTTP client shared by every fetch of a run, with a common cookie store.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    /// Builds the client from a caller-configured builder, so timeout,
    /// default headers and TLS settings pass straight through.
    pub fn new(builder: ClientBuilder) -> HlsResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store.clone()).build()?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    /// GETs a URL, honoring the cancellation token at both await points.
    /// Every playlist, key and segment fetch goes through here, so a
    /// canceled run stops at its next suspension point.
    pub async fn fetch_bytes(&self, url: Url, cancel: &CancellationToken) -> HlsResult<Bytes> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(HlsError::Canceled),
            response = self.get(url).send() => response?,
        };
        if !response.status().is_success() {
            return Err(HlsError::HttpStatus(response.status()));
        }
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(HlsError::Canceled),
            bytes = response.bytes() => bytes?,
        };
        Ok(bytes)
    }

    pub fn add_cookies(&self, cookies: Vec<String>, url: impl IntoUrl) {
        let url = url.into_url().unwrap();
        let mut lock = self.cookies_store.lock().unwrap();
        for cookie in cookies {
            _ = lock.parse(&cookie, &url);
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Client::builder()).expect("default reqwest client")
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
