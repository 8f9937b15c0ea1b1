//! Cookie-bearing HTTP session shared by the portal clients.
//!
//! Not a browser — a thin wrapper over `reqwest` with a persistent cookie
//! store, so the cookies minted by the login handshake ride along on every
//! later request. Redirects are followed (the portal signals search results
//! and login success through them); there is no retry layer and no timeout,
//! one request means one attempt.

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

/// A fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl Page {
    /// Whether the status is a 2xx success code.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the final URL path differs from `path`, i.e. the request
    /// was redirected away from the endpoint it was sent to.
    pub(crate) fn redirected_from(&self, path: &str) -> bool {
        self.url.path() != path
    }

    /// Error out unless the status is a success code.
    pub(crate) fn require_success(self) -> Result<Page> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::UnexpectedStatus {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }
}

/// Cookie-bearing HTTP session.
///
/// Cloning is cheap and shares the connection pool and cookie store, which
/// is how the per-subsystem clients stay on one authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
}

impl Session {
    /// Create a fresh session with an empty cookie store.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("tusur/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` as-is.
    pub async fn get(&self, url: &str) -> Result<Page> {
        let response = self.client.get(url).send().await?;
        Self::read_page(response).await
    }

    /// GET `url` with extra query parameters.
    pub async fn get_with_query<Q>(&self, url: &str, query: &Q) -> Result<Page>
    where
        Q: Serialize + ?Sized,
    {
        let response = self.client.get(url).query(query).send().await?;
        Self::read_page(response).await
    }

    /// POST a url-encoded form.
    pub async fn post_form<F>(&self, url: &str, form: &F) -> Result<Page>
    where
        F: Serialize + ?Sized,
    {
        let response = self.client.post(url).form(form).send().await?;
        Self::read_page(response).await
    }

    /// POST a JSON body with extra query parameters.
    pub async fn post_json<Q, B>(&self, url: &str, query: &Q, body: &B) -> Result<Page>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let response = self.client.post(url).query(query).json(body).send().await?;
        Self::read_page(response).await
    }

    async fn read_page(response: reqwest::Response) -> Result<Page> {
        let url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Page { url, status, body })
    }
}
