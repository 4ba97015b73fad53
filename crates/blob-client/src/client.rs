//! Block blob HTTP client.
//!
//! Async client using `reqwest`. Authorization travels in the pre-signed
//! URL's query string; extra headers from the [`UploadTarget`] are forwarded
//! verbatim on every request.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use blockload_protocol::constants::{
    API_VERSION, BLOB_TYPE_BLOCK, BLOCK_LIST_CONTENT_TYPE, COMP_BLOCK, COMP_BLOCK_LIST,
    HEADER_BLOB_CONTENT_TYPE, HEADER_BLOB_TYPE, HEADER_COMMITTED_BLOCK_COUNT, HEADER_CONTENT_MD5,
    HEADER_DATE, HEADER_RANGE, HEADER_VERSION,
};
use blockload_protocol::{
    BlobProperties, BlockId, ByteRange, UploadTarget, block_list_xml, request_date,
};
use md5::{Digest, Md5};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, HeaderValue, LAST_MODIFIED};
use reqwest::{Response, Url};
use tracing::{debug, trace};

use crate::error::BlobError;

/// Stateless client for the four block blob operations.
#[derive(Debug, Clone)]
pub struct BlobClient {
    http: reqwest::Client,
    content_md5: bool,
}

impl BlobClient {
    /// Creates a client that sends `Content-MD5` with every block.
    pub fn new() -> Result<Self, BlobError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http))
    }

    /// Wraps an existing `reqwest` client (timeouts, proxies).
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            content_md5: true,
        }
    }

    /// Enables or disables the per-block `Content-MD5` header.
    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }

    /// Uploads one uncommitted block.
    pub async fn put_block(
        &self,
        target: &UploadTarget,
        block_id: BlockId,
        data: Vec<u8>,
    ) -> Result<(), BlobError> {
        let encoded = block_id.encoded();
        let url = with_query(&target.url, &[("comp", COMP_BLOCK), ("blockid", &encoded)])?;
        let bytes = data.len();

        let mut req = self
            .http
            .put(url)
            .headers(request_headers(&target.headers)?)
            .header(HEADER_BLOB_TYPE, BLOB_TYPE_BLOCK);
        if self.content_md5 {
            req = req.header(HEADER_CONTENT_MD5, content_md5(&data));
        }

        let resp = req.body(data).send().await?;
        check(resp, "put block").await?;

        debug!(block = block_id.index(), block_id = %encoded, bytes, "block uploaded");
        Ok(())
    }

    /// Commits `ids` as the object's content, in exactly the given order.
    pub async fn put_block_list(
        &self,
        target: &UploadTarget,
        ids: &[BlockId],
        content_type: &str,
    ) -> Result<(), BlobError> {
        let url = with_query(&target.url, &[("comp", COMP_BLOCK_LIST)])?;
        let body = block_list_xml(ids);

        let resp = self
            .http
            .put(url)
            .headers(request_headers(&target.headers)?)
            .header(CONTENT_TYPE, BLOCK_LIST_CONTENT_TYPE)
            .header(HEADER_BLOB_CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        check(resp, "put block list").await?;

        debug!(blocks = ids.len(), content_type, "block list committed");
        Ok(())
    }

    /// Reads an object, or the part of it covered by `range`.
    ///
    /// `headers` are forwarded verbatim (subscription keys, tokens).
    pub async fn get_block(
        &self,
        url: &str,
        range: Option<ByteRange>,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, BlobError> {
        let url = parse_url(url)?;
        let mut req = self.http.get(url).headers(request_headers(headers)?);
        if let Some(range) = range {
            req = req.header(HEADER_RANGE, range.header_value());
        }

        let resp = check(req.send().await?, "get block").await?;
        let bytes = resp.bytes().await?.to_vec();

        trace!(?range, bytes = bytes.len(), "block downloaded");
        Ok(bytes)
    }

    /// `HEAD` request for object metadata.
    pub async fn get_blob_properties(
        &self,
        target: &UploadTarget,
    ) -> Result<BlobProperties, BlobError> {
        let url = parse_url(&target.url)?;
        let resp = self
            .http
            .head(url)
            .headers(request_headers(&target.headers)?)
            .send()
            .await?;
        let resp = check(resp, "get blob properties").await?;
        Ok(properties_from_headers(resp.headers()))
    }
}

fn parse_url(url: &str) -> Result<Url, BlobError> {
    Url::parse(url).map_err(|e| BlobError::InvalidUrl {
        url: redact(url),
        reason: e.to_string(),
    })
}

/// Appends protocol query parameters after the SAS query string.
fn with_query(url: &str, params: &[(&str, &str)]) -> Result<Url, BlobError> {
    let mut url = parse_url(url)?;
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in params {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Drops the query string so signatures never end up in logs or errors.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}

fn request_headers(extra: &BTreeMap<String, String>) -> Result<HeaderMap, BlobError> {
    let mut headers = HeaderMap::new();
    headers.insert(HEADER_VERSION, HeaderValue::from_static(API_VERSION));
    let date = request_date(chrono::Utc::now());
    headers.insert(
        HEADER_DATE,
        HeaderValue::from_str(&date).map_err(|_| BlobError::InvalidHeader(HEADER_DATE.into()))?,
    );

    for (name, value) in extra {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BlobError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| BlobError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Base64 MD5 of the block body, checked by the service on receipt.
pub(crate) fn content_md5(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

async fn check(resp: Response, operation: &'static str) -> Result<Response, BlobError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BlobError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

fn properties_from_headers(headers: &HeaderMap) -> BlobProperties {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    BlobProperties {
        content_length: text(CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        content_type: text(CONTENT_TYPE.as_str()),
        etag: text(ETAG.as_str()),
        last_modified: text(LAST_MODIFIED.as_str()),
        blob_type: text(HEADER_BLOB_TYPE),
        committed_block_count: text(HEADER_COMMITTED_BLOCK_COUNT).and_then(|v| v.parse().ok()),
    }
}
