//! Site context supplied by the host: the default site address and the
//! current request digest.
//!
//! # Design
//! The digest is read through `DigestSource` every time a mutating request
//! is built. The core never stores the value it reads, so a host that
//! refreshes its token between calls is always honoured.

use std::fmt;
use std::sync::Arc;

use crate::error::ApiError;

/// Environment variable holding the default site address.
pub const SITE_URL_ENV: &str = "SP_SITE_URL";
/// Environment variable holding a fixed request digest.
pub const REQUEST_DIGEST_ENV: &str = "SP_REQUEST_DIGEST";

/// Supplies the anti-forgery token (`X-RequestDigest`) at call time.
pub trait DigestSource: Send + Sync {
    fn current_digest(&self) -> Option<String>;
}

impl<F> DigestSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_digest(&self) -> Option<String> {
        self()
    }
}

/// A digest that never changes. Suits scripts and tests.
#[derive(Clone)]
pub struct FixedDigest(String);

impl FixedDigest {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }
}

impl DigestSource for FixedDigest {
    fn current_digest(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

struct NoDigest;

impl DigestSource for NoDigest {
    fn current_digest(&self) -> Option<String> {
        None
    }
}

/// Default site address plus the digest source, passed explicitly to the
/// client instead of being read from ambient page state.
#[derive(Clone)]
pub struct SiteContext {
    site_url: String,
    digest: Arc<dyn DigestSource>,
}

impl SiteContext {
    pub fn new(site_url: &str, digest: impl DigestSource + 'static) -> Self {
        Self {
            site_url: trim_site_url(site_url),
            digest: Arc::new(digest),
        }
    }

    /// Context without a digest. Only read operations will build.
    pub fn read_only(site_url: &str) -> Self {
        Self::new(site_url, NoDigest)
    }

    /// Build a context from `SP_SITE_URL` and, if set, `SP_REQUEST_DIGEST`.
    pub fn from_env() -> Result<Self, ApiError> {
        let site_url = std::env::var(SITE_URL_ENV)
            .map_err(|_| ApiError::Config(format!("{SITE_URL_ENV} is not set")))?;
        if site_url.trim().is_empty() {
            return Err(ApiError::Config(format!("{SITE_URL_ENV} is empty")));
        }
        Ok(match std::env::var(REQUEST_DIGEST_ENV) {
            Ok(digest) if !digest.is_empty() => Self::new(&site_url, FixedDigest::new(digest)),
            _ => Self::read_only(&site_url),
        })
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Resolve the site for one call. A non-empty override wins.
    pub fn resolve_site_url(&self, override_url: Option<&str>) -> String {
        match override_url {
            Some(url) if !url.is_empty() => trim_site_url(url),
            _ => self.site_url.clone(),
        }
    }

    /// Read the digest now.
    pub fn request_digest(&self) -> Result<String, ApiError> {
        self.digest
            .current_digest()
            .filter(|d| !d.is_empty())
            .ok_or(ApiError::MissingRequestDigest)
    }
}

impl fmt::Debug for SiteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteContext")
            .field("site_url", &self.site_url)
            .finish_non_exhaustive()
    }
}

fn trim_site_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
