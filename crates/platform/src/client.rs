//! DX directory API client.

use std::time::Duration;

use dxsync_protocol::{
    CreateDatasetRequest, DatasetInfo, Identity, Installation, ListResponse, UploadTarget,
    UploadUrlRequest,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Credentials, Error};

pub const DEFAULT_BASE_URL: &str = "https://dx.example.com/api/v1";

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const APP_ID_HEADER: &str = "x-app-id";
const INSTALLATION_HEADER: &str = "x-installation-id";

/// DX directory API client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client authenticated with `credentials`.
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credentials.api_token()))
            .map_err(|_| Error::InvalidCredentials("API token is not a valid header value"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            APP_ID_HEADER,
            HeaderValue::from_str(credentials.app_id())
                .map_err(|_| Error::InvalidCredentials("app id is not a valid header value"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a request and decodes a JSON response body.
    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, Error> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn get(&self, endpoint: &str, installation: Option<&Installation>) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "GET");
        scoped(self.http.get(url), installation)
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        installation: &Installation,
        body: &B,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "POST");
        scoped(self.http.post(url), Some(installation)).json(body)
    }

    /// Returns the identity the credentials authenticate as.
    pub async fn whoami(&self) -> Result<Identity, Error> {
        self.send(self.get("/whoami", None)).await
    }

    /// Lists the installations visible to the application.
    pub async fn installations(&self) -> Result<Vec<Installation>, Error> {
        let resp: ListResponse<Installation> = self.send(self.get("/installations", None)).await?;
        Ok(resp.data)
    }

    /// Looks up a dataset by exact name within an installation.
    pub async fn find_dataset(
        &self,
        installation: &Installation,
        name: &str,
    ) -> Result<Option<DatasetInfo>, Error> {
        let req = self
            .get("/datasets", Some(installation))
            .query(&[("name", name)]);
        let resp: ListResponse<DatasetInfo> = self.send(req).await?;
        Ok(resp.data.into_iter().find(|d| d.name == name))
    }

    /// Creates a dataset within an installation.
    pub async fn create_dataset(
        &self,
        installation: &Installation,
        request: &CreateDatasetRequest,
    ) -> Result<DatasetInfo, Error> {
        self.send(self.post("/datasets", installation, request))
            .await
    }

    /// Requests a signed URL for uploading a dataset's contents.
    pub async fn upload_target(
        &self,
        installation: &Installation,
        dataset_id: &str,
        request: UploadUrlRequest,
    ) -> Result<UploadTarget, Error> {
        let encoded = utf8_percent_encode(dataset_id, NON_ALPHANUMERIC).to_string();
        let endpoint = format!("/datasets/{encoded}/upload-url");
        self.send(self.post(&endpoint, installation, &request))
            .await
    }
}

fn scoped(
    req: reqwest::RequestBuilder,
    installation: Option<&Installation>,
) -> reqwest::RequestBuilder {
    match installation {
        Some(inst) => req.header(INSTALLATION_HEADER, inst.id.to_string()),
        None => req,
    }
}
