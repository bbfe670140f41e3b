//! Link graph assembly and off-page metrics. Pure, no I/O: takes the
//! pages gathered by a crawl job and reduces them to `Metrics`.

use std::collections::HashSet;

use crate::crawler::url::{domain_of, Domain};
use crate::models::{Backlink, Metrics, Page};

/// Build the backlink graph and derived metrics for `target_domain` from
/// the pages a crawl visited. A backlink is an edge from a page *not* on
/// `target_domain` to a link whose href *is* on `target_domain` -- pages
/// crawled on the target domain itself are only a source of frontier
/// expansion, never of backlinks.
pub fn build_metrics(pages: &[Page], target_domain: &Domain) -> Metrics {
    let mut backlinks = Vec::new();
    let mut referring_domains: HashSet<Domain> = HashSet::new();
    let mut follow_count = 0u32;
    let mut nofollow_count = 0u32;

    for page in pages {
        if &page.domain == target_domain {
            continue;
        }
        for link in &page.links {
            let link_domain = domain_of(&link.href);
            if &link_domain != target_domain {
                continue;
            }

            if link.is_nofollow {
                nofollow_count += 1;
            } else {
                follow_count += 1;
            }
            referring_domains.insert(page.domain.clone());
            backlinks.push(Backlink {
                source_url: page.url.clone(),
                target_url: link.href.clone(),
                anchor: link.anchor.clone(),
                nofollow: link.is_nofollow,
            });
        }
    }

    let total_backlinks = follow_count + nofollow_count;
    let follow_pct = if total_backlinks == 0 {
        0.0
    } else {
        round_to(follow_count as f64 / total_backlinks as f64 * 100.0, 2)
    };

    Metrics {
        target_domain: target_domain.clone(),
        referring_domains: referring_domains.len() as u32,
        total_backlinks,
        follow_count,
        nofollow_count,
        follow_pct,
        estimated_da: estimate_da(referring_domains.len() as u32, total_backlinks),
        pages_crawled: pages.len() as u32,
        backlinks,
    }
}

/// A deliberately simple, explicitly "estimated" authority heuristic:
/// logarithmic in both referring-domain count and total backlink count,
/// bounded to [0, 100]. This is not meant to resemble any third-party
/// vendor's proprietary DA/DR score -- it is a rough, self-hosted stand-in.
fn estimate_da(referring_domains: u32, total_backlinks: u32) -> f64 {
    let raw = (1.0 + referring_domains as f64).log10() * 10.0
        + (1.0 + total_backlinks as f64).log10() * 5.0;
    round_to(raw.clamp(0.0, 100.0), 1)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::url::canonicalize;
    use crate::models::Link;

    fn page(url: &str, domain: &str, links: Vec<Link>) -> Page {
        Page {
            url: canonicalize(url, None).unwrap(),
            domain: Domain::from_raw(domain),
            title: None,
            meta_description: None,
            canonical: None,
            internal_count: links.iter().filter(|l| l.is_internal).count() as u32,
            external_count: links.iter().filter(|l| !l.is_internal).count() as u32,
            follow_count: links.iter().filter(|l| !l.is_nofollow).count() as u32,
            nofollow_count: links.iter().filter(|l| l.is_nofollow).count() as u32,
            links,
        }
    }

    fn link(href: &str, nofollow: bool) -> Link {
        Link {
            href: canonicalize(href, None).unwrap(),
            anchor: "anchor".to_string(),
            rel: if nofollow { "nofollow".to_string() } else { String::new() },
            is_internal: false,
            is_nofollow: nofollow,
        }
    }

    #[test]
    fn no_pages_yields_zeroed_metrics() {
        let target = Domain::from_raw("example.com");
        let metrics = build_metrics(&[], &target);
        assert_eq!(metrics.total_backlinks, 0);
        assert_eq!(metrics.referring_domains, 0);
        assert_eq!(metrics.follow_pct, 0.0);
        assert_eq!(metrics.estimated_da, 0.0);
    }

    #[test]
    fn links_to_target_from_other_domains_are_backlinks() {
        let target = Domain::from_raw("example.com");
        let pages = vec![page(
            "https://referrer.com/post",
            "referrer.com",
            vec![link("https://example.com/page", false)],
        )];
        let metrics = build_metrics(&pages, &target);
        assert_eq!(metrics.total_backlinks, 1);
        assert_eq!(metrics.referring_domains, 1);
        assert_eq!(metrics.follow_count, 1);
        assert_eq!(metrics.nofollow_count, 0);
        assert_eq!(metrics.follow_pct, 100.0);
    }

    #[test]
    fn links_on_target_domain_pages_are_not_backlinks() {
        let target = Domain::from_raw("example.com");
        let pages = vec![page(
            "https://example.com/",
            "example.com",
            vec![link("https://example.com/other", false)],
        )];
        let metrics = build_metrics(&pages, &target);
        assert_eq!(metrics.total_backlinks, 0);
    }

    #[test]
    fn links_to_other_domains_are_ignored() {
        let target = Domain::from_raw("example.com");
        let pages = vec![page(
            "https://referrer.com/post",
            "referrer.com",
            vec![link("https://unrelated.com/page", false)],
        )];
        let metrics = build_metrics(&pages, &target);
        assert_eq!(metrics.total_backlinks, 0);
        assert_eq!(metrics.referring_domains, 0);
    }

    #[test]
    fn multiple_links_from_same_referrer_count_once_toward_referring_domains() {
        let target = Domain::from_raw("example.com");
        let pages = vec![page(
            "https://referrer.com/post",
            "referrer.com",
            vec![
                link("https://example.com/a", false),
                link("https://example.com/b", true),
            ],
        )];
        let metrics = build_metrics(&pages, &target);
        assert_eq!(metrics.referring_domains, 1);
        assert_eq!(metrics.total_backlinks, 2);
        assert_eq!(metrics.follow_count, 1);
        assert_eq!(metrics.nofollow_count, 1);
        assert_eq!(metrics.follow_pct, 50.0);
    }

    #[test]
    fn estimated_da_is_bounded_and_monotonic_in_referring_domains() {
        let target = Domain::from_raw("example.com");
        let few = build_metrics(
            &[page(
                "https://a.com/",
                "a.com",
                vec![link("https://example.com/x", false)],
            )],
            &target,
        );
        let many_pages: Vec<Page> = (0..50)
            .map(|i| {
                page(
                    &format!("https://ref{i}.com/"),
                    &format!("ref{i}.com"),
                    vec![link("https://example.com/x", false)],
                )
            })
            .collect();
        let many = build_metrics(&many_pages, &target);

        assert!(many.estimated_da > few.estimated_da);
        assert!(many.estimated_da <= 100.0);
        assert!(few.estimated_da >= 0.0);
    }
}
