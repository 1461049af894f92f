use layers::{Credentials, ServiceLayer};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::metadata::{BoxFuture, FetchError, ServiceInfo, ServiceLegend, ServiceMetadataClient};

/// Fetches service metadata over HTTP (`?f=json` endpoints).
#[derive(Debug, Clone, Default)]
pub struct HttpMetadataClient {
    http: reqwest::Client,
}

impl HttpMetadataClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds the `?f=json` request for `path` under the service, with the
    /// service's credentials attached.
    fn build_request(
        &self,
        service: &ServiceLayer,
        path: &str,
    ) -> Result<reqwest::Request, FetchError> {
        let url = format!("{}{path}", service.base_url());
        let mut request = self.http.get(&url).query(&[("f", "json")]);
        match &service.credentials {
            Credentials::Anonymous => {}
            Credentials::Token { token } => {
                request = request.query(&[("token", token.as_str())]);
            }
            Credentials::Forward { cookie } => {
                request = request.header(reqwest::header::COOKIE, cookie.as_str());
            }
        }
        request
            .build()
            .map_err(|e| FetchError::with_source(format!("invalid request for {url}"), e))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &ServiceLayer,
        path: &str,
    ) -> Result<T, FetchError> {
        let request = self.build_request(service, path)?;
        let url = format!("{}{path}", service.base_url());

        debug!("GET {url}");
        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|e| FetchError::with_source(format!("GET {url} failed"), e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("GET {url}: HTTP {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::with_source(format!("GET {url}: body read failed"), e))?;
        parse_service_response(&url, &body)
    }
}

/// Decodes a service JSON body; services report failures as a 200 response
/// carrying an `error` object.
pub fn parse_service_response<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::with_source(format!("{url}: invalid JSON"), e))?;

    if let Some(err) = value.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(FetchError::new(format!(
            "{url}: service error {code}: {message}"
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| FetchError::with_source(format!("{url}: unexpected payload"), e))
}

impl ServiceMetadataClient for HttpMetadataClient {
    fn fetch_info<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceInfo, FetchError>> {
        Box::pin(self.get_json(service, ""))
    }

    fn fetch_legend<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceLegend, FetchError>> {
        Box::pin(self.get_json(service, "/legend"))
    }
}
