//! Post records mapped out of CMS documents.

use serde::Deserialize;
use time::OffsetDateTime;

use super::dates;
use super::error::DomainError;
use super::rich_text::{self, RichTextNode};
use crate::cms::Document;

/// Fields that may be modelled as key text or as structured text in the CMS.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Rich(Vec<RichTextNode>),
}

impl TextField {
    pub fn to_plain(&self) -> String {
        match self {
            TextField::Plain(value) => value.trim().to_string(),
            TextField::Rich(nodes) => rich_text::as_text(nodes).trim().to_string(),
        }
    }
}

fn plain(field: Option<TextField>) -> String {
    field.map(|value| value.to_plain()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub first_publication_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub first_publication_date: Option<OffsetDateTime>,
    pub content: Vec<ContentGroup>,
}

/// One titled section of a post body.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentGroup {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryData {
    #[serde(default)]
    title: Option<TextField>,
    #[serde(default)]
    subtitle: Option<TextField>,
    #[serde(default)]
    author: Option<TextField>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailData {
    #[serde(default)]
    title: Option<TextField>,
    #[serde(default)]
    author: Option<TextField>,
    #[serde(default)]
    banner: Option<Banner>,
    #[serde(default)]
    content: Option<Vec<RawContentGroup>>,
}

#[derive(Debug, Deserialize)]
struct Banner {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContentGroup {
    #[serde(default)]
    heading: Option<TextField>,
    #[serde(default)]
    body: Option<Vec<RichTextNode>>,
}

fn uid_of(document: &Document) -> Result<String, DomainError> {
    document
        .uid
        .as_deref()
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DomainError::missing_uid(&document.id))
}

fn published_at(document: &Document) -> Result<Option<OffsetDateTime>, DomainError> {
    document
        .first_publication_date
        .as_deref()
        .map(dates::parse_cms_timestamp)
        .transpose()
}

fn decode_data<T>(document: &Document) -> Result<T, DomainError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if document.data.is_null() {
        return Ok(T::default());
    }
    T::deserialize(&document.data).map_err(|source| DomainError::decode(&document.id, source))
}

impl PostSummary {
    pub fn from_document(document: &Document) -> Result<Self, DomainError> {
        let slug = uid_of(document)?;
        let data: SummaryData = decode_data(document)?;

        Ok(Self {
            id: document.id.clone(),
            slug,
            title: plain(data.title),
            subtitle: plain(data.subtitle),
            author: plain(data.author),
            first_publication_date: published_at(document)?,
        })
    }
}

impl PostDetail {
    pub fn from_document(document: &Document) -> Result<Self, DomainError> {
        let slug = uid_of(document)?;
        let data: DetailData = decode_data(document)?;

        let content = data
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|group| ContentGroup {
                heading: plain(group.heading),
                body: group.body.unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            id: document.id.clone(),
            slug,
            title: plain(data.title),
            banner_url: data
                .banner
                .and_then(|banner| banner.url)
                .filter(|url| !url.trim().is_empty()),
            author: plain(data.author),
            first_publication_date: published_at(document)?,
            content,
        })
    }
}
