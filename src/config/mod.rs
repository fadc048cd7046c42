//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, CmsOverrides, Command, ExportArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "spacetraveling";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POST_TYPE: &str = "post";
const DEFAULT_PAGE_SIZE: u32 = 3;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SITE_TITLE: &str = "spacetraveling";
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_COMMENTS_THEME: &str = "photon-dark";
const DEFAULT_COMMENTS_ISSUE_TERM: &str = "pathname";
const DEFAULT_CACHE_CAPACITY: usize = 256;
const DEFAULT_LISTING_TTL_SECS: u64 = 60 * 60 * 24;
const DEFAULT_POST_TTL_SECS: u64 = 60 * 30;
const DEFAULT_EXPORT_DIR: &str = "dist";
const DEFAULT_EXPORT_CONCURRENCY: u32 = 4;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cms: CmsSettings,
    pub site: SiteSettings,
    pub comments: CommentsSettings,
    pub cache: CacheSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CmsSettings {
    pub api_endpoint: Url,
    pub access_token: Option<String>,
    pub post_type: String,
    pub page_size: NonZeroU32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub timezone: Tz,
}

/// Utterances widget settings; the widget is omitted when `repo` is unset.
#[derive(Debug, Clone)]
pub struct CommentsSettings {
    pub repo: Option<String>,
    pub theme: String,
    pub issue_term: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub listing_ttl: Duration,
    pub post_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub concurrency: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SPACETRAVELING").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Export(args)) => raw.apply_export_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cms: RawCmsSettings,
    site: RawSiteSettings,
    comments: RawCommentsSettings,
    cache: RawCacheSettings,
    export: RawExportSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }

        self.apply_cms_overrides(&overrides.cms);
    }

    fn apply_export_overrides(&mut self, args: &ExportArgs) {
        if let Some(out) = args.out.as_ref() {
            self.export.output_dir = Some(out.clone());
        }
        if let Some(concurrency) = args.concurrency {
            self.export.concurrency = Some(concurrency);
        }

        self.apply_cms_overrides(&args.cms);
    }

    fn apply_cms_overrides(&mut self, overrides: &CmsOverrides) {
        if let Some(endpoint) = overrides.api_endpoint.as_ref() {
            self.cms.api_endpoint = Some(endpoint.clone());
        }
        if let Some(token) = overrides.access_token.as_ref() {
            self.cms.access_token = Some(token.clone());
        }
        if let Some(size) = overrides.page_size {
            self.cms.page_size = Some(size);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cms,
            site,
            comments,
            cache,
            export,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cms: build_cms_settings(cms)?,
            site: build_site_settings(site)?,
            comments: build_comments_settings(comments),
            cache: build_cache_settings(cache)?,
            export: build_export_settings(export)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cms_settings(cms: RawCmsSettings) -> Result<CmsSettings, LoadError> {
    let endpoint = cms
        .api_endpoint
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid("cms.api_endpoint", "an API endpoint is required"))?;
    let api_endpoint = Url::parse(&endpoint)
        .map_err(|err| LoadError::invalid("cms.api_endpoint", format!("invalid URL: {err}")))?;
    if !matches!(api_endpoint.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "cms.api_endpoint",
            "scheme must be http or https",
        ));
    }

    let access_token = cms.access_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let post_type = cms
        .post_type
        .unwrap_or_else(|| DEFAULT_POST_TYPE.to_string());
    if post_type.trim().is_empty() {
        return Err(LoadError::invalid("cms.post_type", "must not be empty"));
    }

    let page_size_value = cms.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size_value > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "cms.page_size",
            format!("must not exceed {MAX_PAGE_SIZE}"),
        ));
    }
    let page_size = non_zero_u32(page_size_value.into(), "cms.page_size")?;

    let timeout_secs = cms
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "cms.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CmsSettings {
        api_endpoint,
        access_token,
        post_type,
        page_size,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let title = site.title.unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());

    let timezone_name = site
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = Tz::from_str(timezone_name.trim())
        .map_err(|err| LoadError::invalid("site.timezone", err.to_string()))?;

    let description = site
        .description
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    Ok(SiteSettings {
        title,
        description,
        timezone,
    })
}

fn build_comments_settings(comments: RawCommentsSettings) -> CommentsSettings {
    let repo = comments.utterances_repo.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    CommentsSettings {
        repo,
        theme: comments
            .theme
            .unwrap_or_else(|| DEFAULT_COMMENTS_THEME.to_string()),
        issue_term: comments
            .issue_term
            .unwrap_or_else(|| DEFAULT_COMMENTS_ISSUE_TERM.to_string()),
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    let listing_ttl = non_zero_secs(
        cache.listing_ttl_seconds.unwrap_or(DEFAULT_LISTING_TTL_SECS),
        "cache.listing_ttl_seconds",
    )?;
    let post_ttl = non_zero_secs(
        cache.post_ttl_seconds.unwrap_or(DEFAULT_POST_TTL_SECS),
        "cache.post_ttl_seconds",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        listing_ttl,
        post_ttl,
    })
}

fn build_export_settings(export: RawExportSettings) -> Result<ExportSettings, LoadError> {
    let output_dir = export
        .output_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));
    if output_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "export.output_dir",
            "path must not be empty",
        ));
    }

    let concurrency = non_zero_u32(
        export
            .concurrency
            .unwrap_or(DEFAULT_EXPORT_CONCURRENCY)
            .into(),
        "export.concurrency",
    )?;

    Ok(ExportSettings {
        output_dir,
        concurrency,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCmsSettings {
    api_endpoint: Option<String>,
    access_token: Option<String>,
    post_type: Option<String>,
    page_size: Option<u32>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    description: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentsSettings {
    utterances_repo: Option<String>,
    theme: Option<String>,
    issue_term: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    listing_ttl_seconds: Option<u64>,
    post_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawExportSettings {
    output_dir: Option<PathBuf>,
    concurrency: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
