//! Cursor-driven pagination.
//!
//! Each provider paginates differently (page numbers in a `Link` header, page
//! counts in response headers, offsets in the body, next-links in the body).
//! Adapters reduce each response to a [`Page`] and [`collect_pages`] does the
//! rest: sequential fetches, arrival-order accumulation, and termination
//! exactly when a page reports no successor.

use std::future::Future;

use crate::http::HttpHeaders;
use crate::http::header_get;
use crate::platform::{Op, Result};

/// Page size requested from every provider.
pub const PAGE_SIZE: u32 = 100;

/// One page of results plus the cursor for the next page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn new(items: Vec<T>, next: Option<C>) -> Self {
        Self { items, next }
    }

    /// A terminal page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U, C> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// Fetch pages starting at `first` until one has no successor.
///
/// A page that names its own cursor as the next one is reported as a decode
/// error on `op` rather than looping forever.
pub async fn collect_pages<T, C, F, Fut>(op: &Op, first: C, mut fetch: F) -> Result<Vec<T>>
where
    C: Clone + PartialEq + std::fmt::Debug,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Page<T, C>>>,
{
    let mut items = Vec::new();
    let mut cursor = first;
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.clone()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next {
            None => break,
            Some(next) if next == cursor => {
                return Err(op.decode(format!("pagination cursor {next:?} did not advance")));
            }
            Some(next) => cursor = next,
        }
    }

    tracing::debug!(
        "Fetched {} items over {} pages for {} {}",
        items.len(),
        pages,
        op.name,
        op.resource
    );
    Ok(items)
}

/// Pagination information parsed from a GitHub `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    pub next_page: Option<u32>,
    pub last_page: Option<u32>,
}

/// Parse a `Link` header of the form
/// `<https://api.github.com/...&page=2>; rel="next", <...&page=5>; rel="last"`.
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel)) = (url, rel)
            && let Some(page) = extract_page_from_url(url)
        {
            match rel {
                "next" => info.next_page = Some(page),
                "last" => info.last_page = Some(page),
                _ => {}
            }
        }
    }

    info
}

/// Read the `page` query parameter from a URL.
pub fn extract_page_from_url(url: &str) -> Option<u32> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

/// Next GitHub page from response headers.
pub fn github_next_page(headers: &HttpHeaders) -> Option<u32> {
    header_get(headers, "link").and_then(|h| parse_link_header(h).next_page)
}

/// Next GitLab page from response headers.
///
/// `x-total-pages` decides when present. GitLab omits it for large result
/// sets, in which case a non-empty `x-next-page` decides.
pub fn gitlab_next_page(headers: &HttpHeaders, current: u32) -> Option<u32> {
    let total = header_get(headers, "x-total-pages").and_then(|v| v.trim().parse::<u32>().ok());
    match total {
        Some(total) => (current < total).then_some(current + 1),
        None => header_get(headers, "x-next-page").and_then(|v| v.trim().parse::<u32>().ok()),
    }
}
