use crate::config::{CommentsSettings, SiteSettings};
use crate::presentation::views::{CommentsView, LayoutChrome, PageMetaView};

/// Builds the page frame (title, preview banner, comment widget) for each request.
#[derive(Clone, Debug)]
pub struct ChromeService {
    site_title: String,
    description: String,
    comments: Option<CommentsView>,
}

impl ChromeService {
    pub fn new(site: &SiteSettings, comments: &CommentsSettings) -> Self {
        let comments = comments.repo.as_ref().map(|repo| CommentsView {
            repo: repo.clone(),
            issue_term: comments.issue_term.clone(),
            theme: comments.theme.clone(),
        });

        Self {
            site_title: site.title.clone(),
            description: site.description.clone(),
            comments,
        }
    }

    pub fn load(&self, preview: bool) -> LayoutChrome {
        LayoutChrome {
            site_title: self.site_title.clone(),
            meta: PageMetaView {
                title: self.site_title.clone(),
                description: self.description.clone(),
            },
            preview,
            comments: self.comments.clone(),
            static_links: false,
        }
    }

    /// Frame for pages written by the static exporter.
    pub fn load_static(&self) -> LayoutChrome {
        LayoutChrome {
            static_links: true,
            ..self.load(false)
        }
    }
}
