use scraper::{Html, Selector};

use crate::models::{truncate_chars, Link, Page, MAX_ANCHOR_LEN, MAX_META_DESCRIPTION_LEN, MAX_TITLE_LEN};

use super::url::{self, Url};

/// Parse `html` (fetched from `page_url`, post-redirect) into a `Page`
/// record. `target_domain` is the crawl's target domain string, used to
/// classify each link as internal or external.
pub fn extract(html: &str, page_url: &Url, target_domain: &str) -> Page {
    let document = Html::parse_document(html);
    let domain = url::domain_of(page_url);

    let title = extract_title(&document);
    let meta_description = extract_meta_description(&document);
    let canonical = extract_canonical(&document, page_url);
    let links = extract_links(&document, page_url, target_domain);

    let internal_count = links.iter().filter(|l| l.is_internal).count() as u32;
    let external_count = links.len() as u32 - internal_count;
    let follow_count = links.iter().filter(|l| !l.is_nofollow).count() as u32;
    let nofollow_count = links.len() as u32 - follow_count;

    let page = Page {
        url: page_url.clone(),
        domain,
        title,
        meta_description,
        canonical,
        links,
        internal_count,
        external_count,
        follow_count,
        nofollow_count,
    };
    page.check_invariants();
    page
}

fn extract_title(document: &Html) -> Option<String> {
    let sel = Selector::parse("title").unwrap();
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(&s, MAX_TITLE_LEN))
}

fn extract_meta_description(document: &Html) -> Option<String> {
    let name_sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    let og_sel = Selector::parse(r#"meta[property="og:description"]"#).unwrap();

    let content = document
        .select(&name_sel)
        .next()
        .or_else(|| document.select(&og_sel).next())
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    content.map(|s| truncate_chars(s, MAX_META_DESCRIPTION_LEN))
}

fn extract_canonical(document: &Html, page_url: &Url) -> Option<Url> {
    let sel = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
    let href = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    url::canonicalize(href, Some(page_url)).ok()
}

fn extract_links(document: &Html, page_url: &Url, target_domain: &str) -> Vec<Link> {
    let sel = Selector::parse("a[href]").unwrap();
    let mut links = Vec::new();

    for el in document.select(&sel) {
        let Some(raw_href) = el.value().attr("href") else {
            continue;
        };
        let href = raw_href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.to_lowercase().starts_with("javascript:")
        {
            continue;
        }

        let Ok(resolved) = url::canonicalize(href, Some(page_url)) else {
            continue;
        };

        let anchor = truncate_chars(el.text().collect::<String>().trim(), MAX_ANCHOR_LEN);

        let rel_tokens: Vec<String> = el
            .value()
            .attr("rel")
            .unwrap_or("")
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let rel = rel_tokens.join(" ");
        let is_nofollow = rel_tokens.iter().any(|t| t == "nofollow");

        let is_internal = url::is_same_base_domain(resolved.as_str(), target_domain);

        links.push(Link {
            href: resolved,
            anchor,
            rel,
            is_internal,
            is_nofollow,
        });
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        url::canonicalize(s, None).unwrap()
    }

    #[test]
    fn extracts_title_and_meta_description() {
        let html = r#"<html><head><title>  Hi There  </title>
            <meta name="description" content="A test page"></head><body></body></html>"#;
        let page = extract(html, &url("https://example.com/"), "example.com");
        assert_eq!(page.title.as_deref(), Some("Hi There"));
        assert_eq!(page.meta_description.as_deref(), Some("A test page"));
    }

    #[test]
    fn falls_back_to_og_description() {
        let html = r#"<html><head>
            <meta property="og:description" content="OG desc"></head><body></body></html>"#;
        let page = extract(html, &url("https://example.com/"), "example.com");
        assert_eq!(page.meta_description.as_deref(), Some("OG desc"));
    }

    #[test]
    fn skips_fragment_and_javascript_anchors() {
        let html = r#"<html><body>
            <a href="#section">Jump</a>
            <a href="javascript:void(0)">Nope</a>
            <a href="/real">Real</a>
        </body></html>"#;
        let page = extract(html, &url("https://example.com/"), "example.com");
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].href.as_str(), "https://example.com/real");
    }

    #[test]
    fn classifies_internal_vs_external_and_nofollow() {
        let html = r#"<html><body>
            <a href="/about">About</a>
            <a href="https://blog.example.com/post">Blog</a>
            <a href="https://other.com/page" rel="nofollow sponsored">Other</a>
        </body></html>"#;
        let page = extract(html, &url("https://example.com/"), "example.com");
        assert_eq!(page.internal_count, 2);
        assert_eq!(page.external_count, 1);
        assert_eq!(page.follow_count, 2);
        assert_eq!(page.nofollow_count, 1);
        assert!(page.links[1].is_internal); // subdomain
        assert!(page.links[2].is_nofollow);
    }

    #[test]
    fn canonical_resolved_against_page_url() {
        let html = r#"<html><head><link rel="canonical" href="/canon"></head><body></body></html>"#;
        let page = extract(html, &url("https://example.com/page"), "example.com");
        assert_eq!(
            page.canonical.as_ref().map(Url::as_str),
            Some("https://example.com/canon")
        );
    }

    #[test]
    fn anchor_and_title_truncated() {
        let long_title = "x".repeat(600);
        let html = format!("<html><head><title>{long_title}</title></head><body></body></html>");
        let page = extract(&html, &url("https://example.com/"), "example.com");
        assert_eq!(page.title.unwrap().chars().count(), MAX_TITLE_LEN);
    }

    #[test]
    fn no_links_yields_zeroed_counts() {
        let html = "<html><head><title>Hi</title></head><body>no anchors here</body></html>";
        let page = extract(html, &url("https://example.com/"), "example.com");
        assert_eq!(page.links.len(), 0);
        assert_eq!(page.follow_count, 0);
        assert_eq!(page.nofollow_count, 0);
        assert_eq!(page.internal_count, 0);
        assert_eq!(page.external_count, 0);
    }
}
