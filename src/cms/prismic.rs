use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{ApiInfo, CmsError, ContentRepo, SearchQuery, SearchResponse};
use crate::config::CmsSettings;

const SEARCH_PATH: &str = "documents/search";
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// `ContentRepo` backed by the Prismic REST API (v2).
#[derive(Clone, Debug)]
pub struct PrismicClient {
    http: Client,
    endpoint: Url,
    search_url: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(settings: &CmsSettings) -> Result<Self, CmsError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()?;

        Self::with_client(
            http,
            settings.api_endpoint.clone(),
            settings.access_token.clone(),
        )
    }

    pub fn with_client(
        http: Client,
        endpoint: Url,
        access_token: Option<String>,
    ) -> Result<Self, CmsError> {
        let mut base = endpoint.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base.join(SEARCH_PATH)?;

        Ok(Self {
            http,
            endpoint,
            search_url,
            access_token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("spacetraveling/", env!("CARGO_PKG_VERSION"))
    }

    fn with_token(&self, url: &mut Url) {
        let Some(token) = self.access_token.as_ref() else {
            return;
        };
        if url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM) {
            return;
        }
        url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
    }

    /// The CMS echoes request parameters into its page URLs; the token must
    /// not travel with them into cursors. `follow_page` adds it back.
    fn scrub_page_urls(mut response: SearchResponse) -> SearchResponse {
        response.next_page = response.next_page.as_deref().map(without_access_token);
        response.prev_page = response.prev_page.as_deref().map(without_access_token);
        response
    }

    /// Accept only URLs that point at this repository's search endpoint.
    fn validate_page_url(&self, raw: &str) -> Result<Url, CmsError> {
        let url = Url::parse(raw).map_err(|_| CmsError::ForeignCursor(raw.to_string()))?;

        let same_origin = url.scheme() == self.search_url.scheme()
            && url.host_str() == self.search_url.host_str()
            && url.port_or_known_default() == self.search_url.port_or_known_default();
        if !same_origin || url.path() != self.search_url.path() {
            return Err(CmsError::ForeignCursor(raw.to_string()));
        }

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, CmsError> {
        let started = Instant::now();
        counter!("spacetraveling_cms_requests_total", "operation" => operation).increment(1);

        let result = self.http.get(url).send().await;
        histogram!("spacetraveling_cms_request_ms", "operation" => operation)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let response = Self::check_status(result?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: Response) -> Result<Response, CmsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CmsError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ContentRepo for PrismicClient {
    #[instrument(skip(self))]
    async fn master_ref(&self) -> Result<String, CmsError> {
        let mut url = self.endpoint.clone();
        self.with_token(&mut url);

        let info: ApiInfo = self.get_json("api", url).await?;
        info.master_ref()
            .map(str::to_string)
            .ok_or(CmsError::MissingMasterRef)
    }

    #[instrument(skip(self, query), fields(page = ?query.page, after = ?query.after))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, CmsError> {
        let mut url = self.search_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_pairs() {
                pairs.append_pair(key, &value);
            }
        }
        self.with_token(&mut url);

        let response = Self::scrub_page_urls(self.get_json("search", url).await?);
        debug!(
            results = response.results.len(),
            total = response.total_results_size,
            "search completed"
        );
        Ok(response)
    }

    #[instrument(skip(self, next_page))]
    async fn follow_page(&self, next_page: &str) -> Result<SearchResponse, CmsError> {
        let mut url = self.validate_page_url(next_page)?;
        self.with_token(&mut url);

        let response = self.get_json("follow_page", url).await?;
        Ok(Self::scrub_page_urls(response))
    }
}

fn without_access_token(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM) {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ACCESS_TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> PrismicClient {
        PrismicClient::with_client(
            Client::new(),
            Url::parse(endpoint).expect("valid endpoint"),
            None,
        )
        .expect("client")
    }

    #[test]
    fn search_url_extends_the_endpoint_path() {
        let client = client("https://spacetraveling.cdn.prismic.io/api/v2");
        assert_eq!(
            client.search_url.as_str(),
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search"
        );

        let client = client_with_slash();
        assert_eq!(
            client.search_url.as_str(),
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search"
        );
    }

    fn client_with_slash() -> PrismicClient {
        client("https://spacetraveling.cdn.prismic.io/api/v2/")
    }

    #[test]
    fn accepts_pages_of_the_same_repository() {
        let client = client("https://spacetraveling.cdn.prismic.io/api/v2");
        let url = client
            .validate_page_url(
                "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X&page=2",
            )
            .expect("same repository");
        assert_eq!(url.query(), Some("ref=X&page=2"));
    }

    #[test]
    fn rejects_other_hosts_and_paths() {
        let client = client("https://spacetraveling.cdn.prismic.io/api/v2");

        for candidate in [
            "https://evil.example/api/v2/documents/search?page=2",
            "http://spacetraveling.cdn.prismic.io/api/v2/documents/search?page=2",
            "https://spacetraveling.cdn.prismic.io/api/v2/other?page=2",
            "not a url",
        ] {
            assert!(
                matches!(
                    client.validate_page_url(candidate),
                    Err(CmsError::ForeignCursor(_))
                ),
                "{candidate} should be rejected"
            );
        }
    }

    #[test]
    fn access_token_is_appended_once() {
        let client = PrismicClient::with_client(
            Client::new(),
            Url::parse("https://spacetraveling.cdn.prismic.io/api/v2").expect("valid endpoint"),
            Some("secret".to_string()),
        )
        .expect("client");

        let mut url = Url::parse("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X")
            .expect("valid url");
        client.with_token(&mut url);
        client.with_token(&mut url);

        assert_eq!(url.query(), Some("ref=X&access_token=secret"));
    }

    #[test]
    fn page_urls_lose_the_access_token() {
        assert_eq!(
            without_access_token(
                "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X&access_token=secret&page=2"
            ),
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X&page=2"
        );
        assert_eq!(
            without_access_token("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?access_token=secret"),
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search"
        );

        let untouched = "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X&page=2";
        assert_eq!(without_access_token(untouched), untouched);
    }
}
