//! Generic paged fetching against the tracker API
//!
//! Drives a paginated or scrolled resource to exhaustion behind one
//! interface. The two continuation protocols the tracker speaks:
//!
//! - **scroll**: the response carries an opaque cursor in `X-Scroll-Id`;
//!   absence of the header marks the last page.
//! - **paginate**: the response reports `X-Total-Pages`; a missing header
//!   means a single page.
//!
//! When no strategy hint is given, the first round-trip doubles as a probe
//! and the response headers decide which protocol drives the rest of the
//! fetch. Iteration is bounded so a server that keeps handing out cursors
//! cannot loop the client forever.

use std::sync::Arc;

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tracklane_domain::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_SCROLL_TTL_MS, DEFAULT_START_PAGE, MAX_PAGE_ROUNDTRIPS,
    MIN_SCROLL_TTL_MS,
};
use tracklane_domain::{Result, TracklaneError};

use super::auth::CredentialProvider;
use super::types::{FetchStrategy, PageMeta, PageRequest};
use crate::errors::InfraError;
use crate::http::HttpClient;

const SCROLL_ID_HEADER: &str = "x-scroll-id";
const TOTAL_PAGES_HEADER: &str = "x-total-pages";
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Which continuation protocols an endpoint answered to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedStrategies {
    pub scroll: bool,
    pub paginate: bool,
}

impl SupportedStrategies {
    /// True when at least one protocol is available.
    #[must_use]
    pub fn any(&self) -> bool {
        self.scroll || self.paginate
    }
}

/// Client that exhausts paged tracker resources.
pub struct PagedClient {
    http: HttpClient,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    page_size: u32,
    start_page: u32,
    scroll_ttl_ms: u64,
}

impl PagedClient {
    /// Create a client for the given API root.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(TracklaneError::Config("tracker base url must not be empty".into()));
        }

        Ok(Self {
            http: HttpClient::new()?,
            base_url,
            credentials,
            page_size: DEFAULT_PAGE_SIZE,
            start_page: DEFAULT_START_PAGE,
            scroll_ttl_ms: DEFAULT_SCROLL_TTL_MS,
        })
    }

    /// Replace the underlying transport (e.g. with one carrying custom
    /// timeouts).
    #[must_use]
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_start_page(mut self, start_page: u32) -> Self {
        self.start_page = start_page.max(1);
        self
    }

    /// Scroll-cursor TTL requested on the initial scroll round-trip, clamped
    /// to the protocol minimum.
    #[must_use]
    pub fn with_scroll_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.scroll_ttl_ms = ttl_ms;
        self
    }

    /// Fetch every page of a resource, handing each to `on_page`.
    ///
    /// Pages arrive in server order, exactly once each; `meta.is_last` is
    /// true on the final page only. Without a `strategy` hint the first
    /// response's headers select the protocol.
    ///
    /// # Errors
    /// - `Network` on any transport failure or non-2xx status mid-loop;
    ///   pages already delivered stay delivered.
    /// - `Protocol` when detection finds neither continuation marker, or the
    ///   fetch exceeds the round-trip bound.
    pub async fn fetch_all<T, F>(
        &self,
        request: &PageRequest,
        strategy: Option<FetchStrategy>,
        mut on_page: F,
    ) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>, &PageMeta),
    {
        match strategy {
            Some(FetchStrategy::Scroll) => self.scroll_loop(request, &mut on_page, None).await,
            Some(FetchStrategy::Paginate) => {
                self.paginate_loop(request, &mut on_page, None).await
            }
            None => self.detect_and_fetch(request, &mut on_page).await,
        }
    }

    /// Probe which continuation protocols the endpoint supports.
    ///
    /// One minimal request per protocol; a probe's own failure is reported
    /// as "unsupported" for that protocol only, so this never errors as a
    /// whole.
    pub async fn detect_supported_strategies(&self, request: &PageRequest) -> SupportedStrategies {
        let scroll = match self.round_trip(request, &self.probe_query(FetchStrategy::Scroll)).await
        {
            Ok(response) => header_value(&response, SCROLL_ID_HEADER).is_some(),
            Err(err) => {
                warn!(error = %err, path = %request.path, "scroll probe failed");
                false
            }
        };

        let paginate =
            match self.round_trip(request, &self.probe_query(FetchStrategy::Paginate)).await {
                Ok(response) => header_u32(&response, TOTAL_PAGES_HEADER).is_some(),
                Err(err) => {
                    warn!(error = %err, path = %request.path, "paginate probe failed");
                    false
                }
            };

        SupportedStrategies { scroll, paginate }
    }

    /// First round-trip doubles as the strategy probe.
    async fn detect_and_fetch<T, F>(&self, request: &PageRequest, on_page: &mut F) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>, &PageMeta),
    {
        let response = self.round_trip(request, &self.scroll_query(None)).await?;

        if header_value(&response, SCROLL_ID_HEADER).is_some() {
            debug!(path = %request.path, "detected scroll pagination");
            return self.scroll_loop(request, on_page, Some(response)).await;
        }

        if header_u32(&response, TOTAL_PAGES_HEADER).is_some() {
            debug!(path = %request.path, "detected page-number pagination");
            return self.paginate_loop(request, on_page, Some(response)).await;
        }

        Err(TracklaneError::Protocol(format!(
            "unable to detect pagination strategy for {}: response carries neither scroll nor \
             total-pages markers",
            request.path
        )))
    }

    async fn scroll_loop<T, F>(
        &self,
        request: &PageRequest,
        on_page: &mut F,
        mut pending: Option<Response>,
    ) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>, &PageMeta),
    {
        let mut roundtrips = usize::from(pending.is_some());
        let mut cursor: Option<String> = None;

        loop {
            let response = match pending.take() {
                Some(response) => response,
                None => {
                    if roundtrips >= MAX_PAGE_ROUNDTRIPS {
                        return Err(exhaustion_error(&request.path));
                    }
                    let response =
                        self.round_trip(request, &self.scroll_query(cursor.as_deref())).await?;
                    roundtrips += 1;
                    response
                }
            };

            let next_cursor = header_value(&response, SCROLL_ID_HEADER);
            let meta = PageMeta {
                is_last: next_cursor.is_none(),
                page: None,
                cursor: next_cursor.clone(),
                total_pages: None,
                total_count: header_u64(&response, TOTAL_COUNT_HEADER),
            };

            let items = parse_page::<T>(response).await?;
            on_page(items, &meta);

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    async fn paginate_loop<T, F>(
        &self,
        request: &PageRequest,
        on_page: &mut F,
        mut pending: Option<Response>,
    ) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>, &PageMeta),
    {
        let mut roundtrips = usize::from(pending.is_some());
        let mut page = self.start_page;
        // Last-seen totals; kept when a later response omits the headers.
        let mut total_pages: Option<u32> = None;
        let mut total_count: Option<u64> = None;

        loop {
            let response = match pending.take() {
                Some(response) => response,
                None => {
                    if roundtrips >= MAX_PAGE_ROUNDTRIPS {
                        return Err(exhaustion_error(&request.path));
                    }
                    let response = self.round_trip(request, &self.paginate_query(page)).await?;
                    roundtrips += 1;
                    response
                }
            };

            if let Some(reported) = header_u32(&response, TOTAL_PAGES_HEADER) {
                total_pages = Some(reported);
            }
            if let Some(reported) = header_u64(&response, TOTAL_COUNT_HEADER) {
                total_count = Some(reported);
            }

            // No reported total means the resource is a single page.
            let is_last = total_pages.map_or(true, |total| page >= total);
            let meta =
                PageMeta { is_last, page: Some(page), cursor: None, total_pages, total_count };

            let items = parse_page::<T>(response).await?;
            on_page(items, &meta);

            if is_last {
                return Ok(());
            }
            page = page.saturating_add(1);
        }
    }

    /// One authenticated round-trip. Credential headers are recomputed here,
    /// per call, so a mid-loop token refresh reaches the next page.
    async fn round_trip(
        &self,
        request: &PageRequest,
        protocol_query: &[(String, String)],
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in self.credentials.auth_headers().await? {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let query: Vec<(&str, &str)> = request
            .query
            .iter()
            .chain(protocol_query.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        builder = builder.query(&query);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = self.http.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(TracklaneError::Network(format!(
                "tracker API error (HTTP {status}): {text}"
            )));
        }

        Ok(response)
    }

    fn scroll_query(&self, cursor: Option<&str>) -> Vec<(String, String)> {
        let mut query = vec![("perPage".to_string(), self.page_size.to_string())];
        match cursor {
            Some(cursor) => query.push(("scrollId".to_string(), cursor.to_string())),
            None => {
                query.push(("scroll".to_string(), "true".to_string()));
                query.push((
                    "scrollTTLMillis".to_string(),
                    self.scroll_ttl_ms.max(MIN_SCROLL_TTL_MS).to_string(),
                ));
            }
        }
        query
    }

    fn paginate_query(&self, page: u32) -> Vec<(String, String)> {
        vec![
            ("perPage".to_string(), self.page_size.to_string()),
            ("page".to_string(), page.to_string()),
        ]
    }

    fn probe_query(&self, strategy: FetchStrategy) -> Vec<(String, String)> {
        match strategy {
            FetchStrategy::Scroll => vec![
                ("perPage".to_string(), "1".to_string()),
                ("scroll".to_string(), "true".to_string()),
                ("scrollTTLMillis".to_string(), MIN_SCROLL_TTL_MS.to_string()),
            ],
            FetchStrategy::Paginate => vec![
                ("perPage".to_string(), "1".to_string()),
                ("page".to_string(), self.start_page.to_string()),
            ],
        }
    }
}

async fn parse_page<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
    response.json::<Vec<T>>().await.map_err(|err| {
        let infra: InfraError = err.into();
        TracklaneError::from(infra)
    })
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

fn header_u32(response: &Response, name: &str) -> Option<u32> {
    header_value(response, name).and_then(|value| value.parse().ok())
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    header_value(response, name).and_then(|value| value.parse().ok())
}

fn exhaustion_error(path: &str) -> TracklaneError {
    TracklaneError::Protocol(format!(
        "pagination of {path} did not terminate within {MAX_PAGE_ROUNDTRIPS} round-trips"
    ))
}
