use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url as ParsedUrl;

#[derive(Error, Debug)]
pub enum UrlError {
    #[error("invalid URL: {0}")]
    Parse(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
}

/// A canonical absolute http(s) URL, normalized per the rules in
/// `canonicalize`. Two `Url`s that are `Eq` refer to the same resource
/// as far as the crawler's dedup logic is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Url(String);

impl Url {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Url {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A lowercased host with a leading "www." stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_raw(raw: &str) -> Self {
        Domain(strip_www(&raw.to_lowercase()))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_www(host: &str) -> String {
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Normalize `raw` into a canonical `Url`. If `raw` has no scheme and
/// `base` is given, resolve against it. Lowercases the host, drops the
/// fragment, strips a trailing "/" from the path (unless the path is
/// just "/"), and preserves the query string verbatim.
pub fn canonicalize(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let trimmed = raw.trim();

    let mut parsed = match ParsedUrl::parse(trimmed) {
        Ok(u) => u,
        Err(_) => {
            let base_url = base.ok_or_else(|| UrlError::Parse(trimmed.to_string()))?;
            let base_parsed =
                ParsedUrl::parse(base_url.as_str()).map_err(|_| UrlError::Parse(trimmed.to_string()))?;
            base_parsed
                .join(trimmed)
                .map_err(|_| UrlError::Parse(trimmed.to_string()))?
        }
    };

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }

    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }

    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    Ok(Url(parsed.to_string()))
}

/// Extract the base domain (lowercase, "www." stripped) of a canonical URL.
pub fn domain_of(url: &Url) -> Domain {
    let host = ParsedUrl::parse(url.as_str())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();
    Domain::from_raw(&host)
}

/// True iff `candidate` (a URL or a bare domain string) is on the same
/// base domain as `base` (likewise a URL or bare domain): the domains
/// are equal, or one is a dot-suffix of the other. Subdomains of the
/// base domain are considered internal.
pub fn is_same_base_domain(candidate: &str, base: &str) -> bool {
    let candidate_domain = domain_from_any(candidate);
    let base_domain = domain_from_any(base);

    if candidate_domain.is_empty() || base_domain.is_empty() {
        return false;
    }

    candidate_domain == base_domain
        || candidate_domain.ends_with(&format!(".{base_domain}"))
        || base_domain.ends_with(&format!(".{candidate_domain}"))
}

/// Resolve either a bare domain or a full URL string into a `Domain`,
/// the representation every internal module (engine, graph builder,
/// store) standardizes on -- callers at the HTTP boundary call this
/// once and never pass a raw string past it.
pub fn resolve_domain(s: &str) -> Domain {
    Domain(domain_from_any(s))
}

/// Resolve either a bare domain or a full URL string down to its base
/// domain (lowercase, "www." stripped).
fn domain_from_any(s: &str) -> String {
    let trimmed = s.trim();
    if let Ok(parsed) = ParsedUrl::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            return strip_www(&host.to_lowercase());
        }
    }
    strip_www(&trimmed.to_lowercase())
}
