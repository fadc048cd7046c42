//! Static export: renders every listing page and post into a directory tree.

use std::path::{Path, PathBuf};

use askama::Template;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{info, warn};

use crate::application::chrome::ChromeService;
use crate::application::error::AppError;
use crate::application::feed::{FeedService, ListingPage};
use crate::infra::{assets, error::InfraError};
use crate::presentation::views::{
    FeedLoaderContext, IndexTemplate, LayoutContext, ListingContext, PostTemplate,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub pages: usize,
    pub posts: usize,
    pub assets: usize,
}

pub struct SiteExporter {
    feed: FeedService,
    chrome: ChromeService,
    output_dir: PathBuf,
    concurrency: usize,
}

impl SiteExporter {
    pub fn new(
        feed: FeedService,
        chrome: ChromeService,
        output_dir: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Self {
        Self {
            feed,
            chrome,
            output_dir: output_dir.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self) -> Result<ExportSummary, AppError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(InfraError::from)?;

        let pages = self.export_listing().await?;
        let posts = self.export_posts().await?;
        let assets = self.export_assets().await?;

        let summary = ExportSummary {
            pages,
            posts,
            assets,
        };
        info!(
            output = %self.output_dir.display(),
            pages = summary.pages,
            posts = summary.posts,
            assets = summary.assets,
            "static export finished"
        );
        Ok(summary)
    }

    async fn export_listing(&self) -> Result<usize, AppError> {
        let first = self.feed.listing_page(1, None).await?;
        let total_pages = first.total_pages.max(1);
        self.write_listing(1, total_pages, first).await?;

        let written = stream::iter(2..=total_pages)
            .map(|page| async move {
                let listing = self.feed.listing_page(page, None).await?;
                self.write_listing(page, total_pages, listing).await
            })
            .buffer_unordered(self.concurrency)
            .try_fold(1usize, |count, ()| async move { Ok(count + 1) })
            .await?;

        Ok(written)
    }

    async fn write_listing(
        &self,
        page: u32,
        total_pages: u32,
        listing: ListingPage,
    ) -> Result<(), AppError> {
        let next_href = (page < total_pages).then(|| listing_href(page + 1));
        let content = ListingContext::render(listing.cards, FeedLoaderContext::linked(next_href))?;
        let title = if page == 1 {
            "Home".to_string()
        } else {
            format!("Página {page}")
        };
        let html = IndexTemplate {
            view: LayoutContext::new(self.chrome.load_static().with_title(&title), content),
        }
        .render()?;

        let relative = if page == 1 {
            PathBuf::from("index.html")
        } else {
            Path::new("page").join(page.to_string()).join("index.html")
        };
        self.write_file(&relative, html.as_bytes()).await
    }

    async fn export_posts(&self) -> Result<usize, AppError> {
        let slugs = self.feed.all_slugs().await?;

        let written = stream::iter(slugs)
            .filter(|slug| {
                let safe = is_safe_segment(slug);
                if !safe {
                    warn!(slug = %slug, "skipping post with unsafe slug");
                }
                std::future::ready(safe)
            })
            .map(|slug| async move { self.write_post(&slug).await })
            .buffer_unordered(self.concurrency)
            .try_fold(0usize, |count, written| async move {
                Ok(count + usize::from(written))
            })
            .await?;

        Ok(written)
    }

    async fn write_post(&self, slug: &str) -> Result<bool, AppError> {
        let Some(detail) = self.feed.post_detail(slug, None).await? else {
            warn!(slug = %slug, "post disappeared during export");
            return Ok(false);
        };

        let chrome = self.chrome.load_static().with_title(&detail.title);
        let html = PostTemplate {
            view: LayoutContext::new(chrome, detail),
        }
        .render()?;

        let relative = Path::new("post").join(slug).join("index.html");
        self.write_file(&relative, html.as_bytes()).await?;
        Ok(true)
    }

    async fn export_assets(&self) -> Result<usize, AppError> {
        let files = assets::public_files();
        let count = files.len();
        for (path, contents) in files {
            let relative = Path::new("static").join(path);
            self.write_file(&relative, contents).await?;
        }
        Ok(count)
    }

    async fn write_file(&self, relative: &Path, contents: &[u8]) -> Result<(), AppError> {
        let target = self.output_dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(InfraError::from)?;
        }
        tokio::fs::write(&target, contents)
            .await
            .map_err(InfraError::from)?;
        Ok(())
    }
}

pub fn listing_href(page: u32) -> String {
    if page <= 1 {
        "/".to_string()
    } else {
        format!("/page/{page}/")
    }
}

fn is_safe_segment(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.contains(['/', '\\'])
        && !slug.chars().any(char::is_control)
}
