#![allow(dead_code)]

use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;
use spacetraveling::{
    application::{chrome::ChromeService, feed::FeedService},
    cms::{CmsError, ContentRepo, Document, Predicate, SearchQuery, SearchResponse},
    config::{CmsSettings, CommentsSettings, SiteSettings},
};
use url::Url;

pub const ENDPOINT: &str = "https://spacetraveling.cdn.prismic.io/api/v2";
pub const MASTER_REF: &str = "master-ref";

/// In-memory content service keyed by ref.
#[derive(Default)]
pub struct FakeRepo {
    refs: HashMap<String, Vec<Document>>,
    unavailable: bool,
    searches: Mutex<Vec<SearchQuery>>,
}

impl FakeRepo {
    pub fn new(documents: Vec<Document>) -> Self {
        let mut refs = HashMap::new();
        refs.insert(MASTER_REF.to_string(), documents);
        Self {
            refs,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_ref(mut self, reference: &str, documents: Vec<Document>) -> Self {
        self.refs.insert(reference.to_string(), documents);
        self
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn documents(&self, reference: &str) -> Result<&Vec<Document>, CmsError> {
        if self.unavailable {
            return Err(CmsError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        self.refs.get(reference).ok_or_else(|| CmsError::Status {
            status: 404,
            body: format!("unknown ref {reference}"),
        })
    }

    fn run(&self, query: &SearchQuery) -> Result<SearchResponse, CmsError> {
        let documents = self.documents(&query.reference)?;

        let mut matching: Vec<Document> = documents
            .iter()
            .filter(|document| query.predicates.iter().all(|p| matches(p, document)))
            .cloned()
            .collect();

        if let Some(ordering) = query.orderings.first() {
            matching.sort_by(|left, right| {
                left.first_publication_date
                    .cmp(&right.first_publication_date)
            });
            if ordering.descending {
                matching.reverse();
            }
        }

        if let Some(after) = query.after.as_ref() {
            let position = matching.iter().position(|document| &document.id == after);
            matching = match position {
                Some(index) => matching.split_off(index + 1),
                None => Vec::new(),
            };
        }

        let page_size = query.page_size.unwrap_or(20).max(1) as usize;
        let page = query.page.unwrap_or(1).max(1) as usize;
        let total = matching.len();
        let total_pages = total.div_ceil(page_size).max(1);
        let results: Vec<Document> = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        let next_page = (page < total_pages).then(|| {
            let mut url = Url::parse(&format!("{ENDPOINT}/documents/search")).expect("url");
            url.query_pairs_mut()
                .append_pair("ref", &query.reference)
                .append_pair("page", &(page + 1).to_string())
                .append_pair("pageSize", &page_size.to_string());
            url.to_string()
        });

        Ok(SearchResponse {
            page: page as u32,
            results_per_page: page_size as u32,
            total_results_size: total as u32,
            total_pages: total_pages as u32,
            next_page,
            prev_page: None,
            results,
        })
    }
}

fn matches(predicate: &Predicate, document: &Document) -> bool {
    match predicate {
        Predicate::At { path, value } => match path.as_str() {
            "document.type" => &document.doc_type == value,
            "document.id" => &document.id == value,
            other if other.ends_with(".uid") => document.uid.as_deref() == Some(value.as_str()),
            _ => false,
        },
    }
}

#[async_trait]
impl ContentRepo for FakeRepo {
    async fn master_ref(&self) -> Result<String, CmsError> {
        if self.unavailable {
            return Err(CmsError::MissingMasterRef);
        }
        Ok(MASTER_REF.to_string())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, CmsError> {
        if let Ok(mut guard) = self.searches.lock() {
            guard.push(query.clone());
        }
        self.run(query)
    }

    async fn follow_page(&self, next_page: &str) -> Result<SearchResponse, CmsError> {
        let url = Url::parse(next_page).map_err(|_| CmsError::ForeignCursor(next_page.into()))?;
        if !next_page.starts_with(ENDPOINT) {
            return Err(CmsError::ForeignCursor(next_page.to_string()));
        }

        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let reference = pairs.get("ref").cloned().unwrap_or_default();
        let mut query = SearchQuery::new(reference)
            .predicate(Predicate::document_type("post"))
            .order_by(spacetraveling::cms::Ordering::desc(
                spacetraveling::cms::FIRST_PUBLICATION_DATE,
            ));
        if let Some(page) = pairs.get("page").and_then(|value| value.parse().ok()) {
            query = query.page(page);
        }
        if let Some(size) = pairs.get("pageSize").and_then(|value| value.parse().ok()) {
            query = query.page_size(size);
        }
        self.run(&query)
    }
}

/// A `post` document published on `2021-03-{day}`.
pub fn post(id: &str, uid: &str, title: &str, day: u32) -> Document {
    post_at(id, uid, title, &format!("2021-03-{day:02}T19:25:28+0000"))
}

/// A `post` document with an explicit CMS timestamp.
pub fn post_at(id: &str, uid: &str, title: &str, published: &str) -> Document {
    Document {
        id: id.to_string(),
        uid: Some(uid.to_string()),
        doc_type: "post".to_string(),
        first_publication_date: Some(published.to_string()),
        last_publication_date: None,
        data: json!({
            "title": title,
            "subtitle": format!("Subtítulo de {title}"),
            "author": "Joseph Oliveira",
            "banner": {"url": "https://images.prismic.io/spacetraveling/banner.png"},
            "content": [
                {
                    "heading": "Proin et varius",
                    "body": [
                        {"type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": []}
                    ]
                }
            ]
        }),
    }
}

/// Five posts, published on March 1st through 5th.
pub fn sample_posts() -> Vec<Document> {
    vec![
        post("id-1", "primeiro-post", "Primeiro post", 1),
        post("id-2", "segundo-post", "Segundo post", 2),
        post("id-3", "terceiro-post", "Terceiro post", 3),
        post("id-4", "quarto-post", "Quarto post", 4),
        post("id-5", "quinto-post", "Quinto post", 5),
    ]
}

pub fn cms_settings(page_size: u32) -> CmsSettings {
    CmsSettings {
        api_endpoint: Url::parse(ENDPOINT).expect("endpoint"),
        access_token: None,
        post_type: "post".to_string(),
        page_size: NonZeroU32::new(page_size).expect("page size"),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn site_settings() -> SiteSettings {
    SiteSettings {
        title: "spacetraveling".to_string(),
        description: String::new(),
        timezone: chrono_tz::America::Sao_Paulo,
    }
}

pub fn comments_settings(repo: Option<&str>) -> CommentsSettings {
    CommentsSettings {
        repo: repo.map(str::to_string),
        theme: "photon-dark".to_string(),
        issue_term: "pathname".to_string(),
    }
}

pub fn feed_service(repo: Arc<FakeRepo>) -> FeedService {
    FeedService::new(repo, &cms_settings(3), chrono_tz::America::Sao_Paulo)
}

pub fn chrome_service(repo: Option<&str>) -> ChromeService {
    ChromeService::new(&site_settings(), &comments_settings(repo))
}
