use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use crate::error::{AppError, Result};

/// Client for the hosted datastore's PostgREST-style REST interface.
#[derive(Clone)]
pub struct Datastore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Datastore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        // One client per datastore so connections are reused across requests
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Datastore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// `GET /rest/v1/{table}?select={columns}`
    pub async fn select<T: DeserializeOwned>(&self, table: &str, columns: &str) -> Result<Vec<T>> {
        debug!(table, columns, "datastore select");
        let request = self
            .client
            .get(self.endpoint(table))
            .query(&[("select", columns)]);

        let res = self.send(request).await?;
        Ok(res.json().await?)
    }

    /// `POST /rest/v1/rpc/{function}` with the params as the JSON body.
    pub async fn rpc<P, T>(&self, function: &str, params: &P) -> Result<Vec<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(function, "datastore rpc");
        let request = self
            .client
            .post(self.endpoint(&format!("rpc/{}", function)))
            .json(params);

        let res = self.send(request).await?;
        Ok(res.json().await?)
    }

    /// `POST /rest/v1/{table}` inserting every row in one request.
    pub async fn insert<R: Serialize>(&self, table: &str, rows: &[R]) -> Result<()> {
        debug!(table, rows = rows.len(), "datastore insert");
        let request = self
            .client
            .post(self.endpoint(table))
            .header("Prefer", "return=minimal")
            .json(rows);

        self.send(request).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let res = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("datastore returned {}: {}", status, body)));
        }

        Ok(res)
    }
}
