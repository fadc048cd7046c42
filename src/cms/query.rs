//! Search query construction for the documents endpoint.

use std::fmt;

/// A single query predicate. Only `at` is needed by the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::At {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }

    pub fn document_id(id: &str) -> Self {
        Self::at("document.id", id)
    }

    pub fn uid(doc_type: &str, uid: &str) -> Self {
        Self::at(format!("my.{doc_type}.uid"), uid)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::At { path, value } => {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "[at({path}, \"{escaped}\")]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} desc", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

pub const FIRST_PUBLICATION_DATE: &str = "document.first_publication_date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub reference: String,
    pub predicates: Vec<Predicate>,
    pub orderings: Vec<Ordering>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    pub after: Option<String>,
    pub fetch: Vec<String>,
}

impl SearchQuery {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            predicates: Vec::new(),
            orderings: Vec::new(),
            page_size: None,
            page: None,
            after: None,
            fetch: Vec::new(),
        }
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn after(mut self, document_id: impl Into<String>) -> Self {
        self.after = Some(document_id.into());
        self
    }

    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Query-string pairs in the order the endpoint documents them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("ref", self.reference.clone())];

        if !self.predicates.is_empty() {
            let joined: String = self.predicates.iter().map(ToString::to_string).collect();
            pairs.push(("q", format!("[{joined}]")));
        }
        if !self.orderings.is_empty() {
            let joined = self
                .orderings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("orderings", format!("[{joined}]")));
        }
        if let Some(size) = self.page_size {
            pairs.push(("pageSize", size.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(after) = self.after.as_ref() {
            pairs.push(("after", after.clone()));
        }
        if !self.fetch.is_empty() {
            pairs.push(("fetch", self.fetch.join(",")));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_query_matches_endpoint_syntax() {
        let query = SearchQuery::new("master-ref")
            .predicate(Predicate::document_type("post"))
            .order_by(Ordering::desc(FIRST_PUBLICATION_DATE))
            .page_size(3)
            .fetch(["post.title", "post.subtitle", "post.author"]);

        assert_eq!(
            query.to_pairs(),
            vec![
                ("ref", "master-ref".to_string()),
                ("q", r#"[[at(document.type, "post")]]"#.to_string()),
                (
                    "orderings",
                    "[document.first_publication_date desc]".to_string()
                ),
                ("pageSize", "3".to_string()),
                ("fetch", "post.title,post.subtitle,post.author".to_string()),
            ]
        );
    }

    #[test]
    fn adjacent_query_carries_after_and_ascending_order() {
        let pairs = SearchQuery::new("ref")
            .predicate(Predicate::document_type("post"))
            .order_by(Ordering::asc(FIRST_PUBLICATION_DATE))
            .page_size(1)
            .after("YF0ceBIAACIAnZ3b")
            .to_pairs();

        assert!(pairs.contains(&(
            "orderings",
            "[document.first_publication_date]".to_string()
        )));
        assert!(pairs.contains(&("after", "YF0ceBIAACIAnZ3b".to_string())));
    }

    #[test]
    fn multiple_predicates_share_one_outer_bracket() {
        let pairs = SearchQuery::new("ref")
            .predicate(Predicate::document_type("post"))
            .predicate(Predicate::uid("post", "como-utilizar-hooks"))
            .to_pairs();

        assert_eq!(
            pairs[1],
            (
                "q",
                r#"[[at(document.type, "post")][at(my.post.uid, "como-utilizar-hooks")]]"#
                    .to_string()
            )
        );
    }

    #[test]
    fn predicate_values_are_quoted_safely() {
        let predicate = Predicate::uid("post", r#"a"b"#);
        assert_eq!(predicate.to_string(), r#"[at(my.post.uid, "a\"b")]"#);
    }
}
