use std::{num::NonZeroU32, sync::Arc, time::Duration};

use httpmock::MockServer;
use reqwest::{Client, Url};
use serde_json::json;
use spacetraveling::{
    application::{feed::FeedService, pagination::FeedCursor},
    cms::{
        CmsError, ContentRepo, FIRST_PUBLICATION_DATE, Ordering, Predicate, PrismicClient,
        SearchQuery,
    },
    config::CmsSettings,
};

fn client(server: &MockServer, token: Option<&str>) -> PrismicClient {
    let endpoint = Url::parse(&server.url("/api/v2")).expect("endpoint");
    PrismicClient::with_client(Client::new(), endpoint, token.map(str::to_string))
        .expect("client")
}

fn search_payload(next_page: Option<String>) -> serde_json::Value {
    json!({
        "page": 1,
        "results_per_page": 1,
        "total_results_size": 2,
        "total_pages": 2,
        "next_page": next_page,
        "prev_page": null,
        "results": [{
            "id": "YF0ceBIAACIAnZ3b",
            "uid": "como-utilizar-hooks",
            "type": "post",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "last_publication_date": "2021-03-15T19:25:28+0000",
            "data": {"title": "Como utilizar Hooks", "author": "Joseph Oliveira"}
        }]
    })
}

#[tokio::test]
async fn master_ref_reads_the_api_root() -> Result<(), CmsError> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET").path("/api/v2");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    r#"{"refs":[
                        {"id":"master","ref":"YF0dGBIAACYAnZ6n","label":"Master","isMasterRef":true}
                    ]}"#,
                );
        })
        .await;

    let reference = client(&server, None).master_ref().await?;

    assert_eq!(reference, "YF0dGBIAACYAnZ6n");
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn master_ref_requires_a_master_entry() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/v2");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"refs":[]}"#);
        })
        .await;

    let err = client(&server, None)
        .master_ref()
        .await
        .expect_err("no master ref");

    assert!(matches!(err, CmsError::MissingMasterRef));
}

#[tokio::test]
async fn search_sends_the_query_string() -> Result<(), CmsError> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2/documents/search")
                .query_param("ref", "master-ref")
                .query_param("q", r#"[[at(document.type, "post")]]"#)
                .query_param("orderings", "[document.first_publication_date desc]")
                .query_param("pageSize", "1")
                .query_param("fetch", "post.title,post.author");
            then.status(200).json_body(search_payload(None));
        })
        .await;

    let query = SearchQuery::new("master-ref")
        .predicate(Predicate::document_type("post"))
        .order_by(Ordering::desc(FIRST_PUBLICATION_DATE))
        .page_size(1)
        .fetch(["post.title", "post.author"]);
    let response = client(&server, None).search(&query).await?;

    mock.assert_async().await;
    assert_eq!(response.total_pages, 2);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].uid.as_deref(), Some("como-utilizar-hooks"));
    Ok(())
}

#[tokio::test]
async fn access_token_is_appended_to_requests() -> Result<(), CmsError> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2/documents/search")
                .query_param("ref", "master-ref")
                .query_param("access_token", "secret-token");
            then.status(200).json_body(search_payload(None));
        })
        .await;

    client(&server, Some("secret-token"))
        .search(&SearchQuery::new("master-ref"))
        .await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn error_statuses_surface_the_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/v2/documents/search");
            then.status(404).body("Ref not found");
        })
        .await;

    let err = client(&server, None)
        .search(&SearchQuery::new("expired-ref"))
        .await
        .expect_err("404 should fail");

    match err {
        CmsError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Ref not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn follow_page_fetches_the_cms_url_verbatim() -> Result<(), CmsError> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2/documents/search")
                .query_param("ref", "master-ref")
                .query_param("page", "2")
                .query_param("pageSize", "1");
            then.status(200).json_body(search_payload(None));
        })
        .await;

    let next_page = server.url("/api/v2/documents/search?ref=master-ref&page=2&pageSize=1");
    let response = client(&server, None).follow_page(&next_page).await?;

    mock.assert_async().await;
    assert!(response.next_page.is_none());
    Ok(())
}

#[tokio::test]
async fn follow_page_refuses_other_hosts_without_a_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).json_body(search_payload(None));
        })
        .await;

    let client = client(&server, Some("secret-token"));
    for url in [
        "https://attacker.example/api/v2/documents/search?page=2",
        "not a url",
    ] {
        let err = client.follow_page(url).await.expect_err("foreign url");
        assert!(matches!(err, CmsError::ForeignCursor(_)));
    }

    let other_path = server.url("/api/v2/documents");
    let err = client.follow_page(&other_path).await.expect_err("foreign path");
    assert!(matches!(err, CmsError::ForeignCursor(_)));

    assert_eq!(mock.calls_async().await, 0);
}

#[tokio::test]
async fn listing_cursors_never_carry_the_access_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2")
                .query_param("access_token", "secret-token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"refs":[{"id":"master","ref":"M","isMasterRef":true}]}"#);
        })
        .await;
    let echoed_next_page =
        server.url("/api/v2/documents/search?ref=M&page=2&pageSize=3&access_token=secret-token");
    let first_page = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2/documents/search")
                .query_param("ref", "M")
                .query_param("page", "1")
                .query_param("access_token", "secret-token");
            then.status(200)
                .json_body(search_payload(Some(echoed_next_page.clone())));
        })
        .await;
    let second_page = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/v2/documents/search")
                .query_param("ref", "M")
                .query_param("page", "2")
                .query_param("access_token", "secret-token");
            then.status(200).json_body(search_payload(None));
        })
        .await;

    let settings = CmsSettings {
        api_endpoint: Url::parse(&server.url("/api/v2")).expect("endpoint"),
        access_token: Some("secret-token".to_string()),
        post_type: "post".to_string(),
        page_size: NonZeroU32::new(3).expect("page size"),
        request_timeout: Duration::from_secs(5),
    };
    let client = PrismicClient::new(&settings).expect("client");
    let feed = FeedService::new(Arc::new(client), &settings, chrono_tz::UTC);

    let page = feed.home_page(None).await.expect("home page");
    let cursor = page.next_cursor.expect("cursor for page 2");
    let decoded = FeedCursor::decode(&cursor).expect("decodable cursor");
    assert!(!decoded.next_page().contains("secret-token"));
    assert!(!decoded.next_page().contains("access_token"));
    assert!(decoded.next_page().contains("page=2"));

    feed.append_page(&cursor).await.expect("second page");
    first_page.assert_async().await;
    second_page.assert_async().await;
}
