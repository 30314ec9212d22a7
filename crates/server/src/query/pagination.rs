//! Offset pagination with navigation metadata.
//!
//! A [`PageRequest`] is resolved leniently from raw query parameters (bad
//! values fall back to defaults, oversized pages are clamped) and a
//! [`Page`] carries one slice plus the `meta`/`links` blocks clients use to
//! render a paginator.

use serde::Serialize;

use crate::config::PaginationConfig;

/// Pages on each side of the current page in a windowed link list.
const ON_EACH_SIDE: u32 = 3;

const PREVIOUS_LABEL: &str = "« Previous";
const NEXT_LABEL: &str = "Next »";
const GAP_LABEL: &str = "...";

/// Which page to fetch, and how big pages are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
    /// Extra query pairs carried into every generated link.
    query: Vec<(String, String)>,
}

impl PageRequest {
    /// A request for `page` of size `per_page`, both raised to at least 1.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            query: Vec::new(),
        }
    }

    /// Resolve raw `page` / `per_page` parameters.
    ///
    /// Never fails: a missing, non-numeric or non-positive page becomes 1,
    /// a missing, non-numeric or non-positive size becomes the configured
    /// default, and a size above the configured maximum is clamped to it.
    #[must_use]
    pub fn resolve(page: Option<&str>, per_page: Option<&str>, config: &PaginationConfig) -> Self {
        let page = parse_positive(page).unwrap_or(1);
        let per_page = parse_positive(per_page)
            .unwrap_or(config.per_page)
            .min(config.max_per_page);
        Self::new(page, per_page)
    }

    /// Keep `pairs` (typically the active filters) in page links.
    #[must_use]
    pub fn with_query<K, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, String)>,
    {
        self.query = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of items before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Cut this page out of an already filtered and ordered list.
    #[must_use]
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(offset)
            .take(self.per_page as usize)
            .cloned()
            .collect()
    }

    /// Relative link to `page`, keeping the size and carried query.
    #[must_use]
    pub fn url(&self, page: u32) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            query.append_pair(key, value);
        }
        query
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.per_page.to_string());
        format!("?{}", query.finish())
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    let n = value?.trim().parse::<i64>().ok()?;
    if n < 1 {
        return None;
    }
    Some(u32::try_from(n).unwrap_or(u32::MAX))
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub links: PageLinks,
    pub meta: PageMeta,
}

/// Shortcut links to neighbouring and boundary pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Position of a page within the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u32,
    /// 1-based index of the first item on this page.
    pub from: Option<u64>,
    pub last_page: u32,
    pub links: Vec<PageLink>,
    pub per_page: u32,
    /// 1-based index of the last item on this page.
    pub to: Option<u64>,
    pub total: u64,
}

/// An entry in a rendered paginator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    /// `None` for the gap marker and for previous/next at the edges.
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

impl<T> Page<T> {
    /// Wrap `data`, the slice fetched for `request` out of `total` items.
    #[must_use]
    pub fn new(data: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let current = request.page();
        let last_page = last_page(total, request.per_page());

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let offset = request.offset();
            (Some(offset + 1), Some(offset + data.len() as u64))
        };

        let prev = (current > 1).then(|| request.url(current - 1));
        let next = (current < last_page).then(|| request.url(current + 1));

        let mut links = Vec::new();
        links.push(PageLink {
            url: prev.clone(),
            label: PREVIOUS_LABEL.to_owned(),
            active: false,
        });
        links.extend(window(current, last_page).into_iter().map(|slot| match slot {
            Some(n) => PageLink {
                url: Some(request.url(n)),
                label: n.to_string(),
                active: n == current,
            },
            None => PageLink {
                url: None,
                label: GAP_LABEL.to_owned(),
                active: false,
            },
        }));
        links.push(PageLink {
            url: next.clone(),
            label: NEXT_LABEL.to_owned(),
            active: false,
        });

        Self {
            data,
            links: PageLinks {
                first: request.url(1),
                last: request.url(last_page),
                prev,
                next,
            },
            meta: PageMeta {
                current_page: current,
                from,
                last_page,
                links,
                per_page: request.per_page(),
                to,
                total,
            },
        }
    }

    /// Transform every item, keeping the pagination data.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            links: self.links,
            meta: self.meta,
        }
    }
}

/// `ceil(total / per_page)`, never below 1.
fn last_page(total: u64, per_page: u32) -> u32 {
    let pages = total.div_ceil(u64::from(per_page.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

/// Page numbers to list, with `None` marking a gap.
///
/// Short paginators list every page. Longer ones pin the first and last two
/// pages and show a window around the current page, widening it when the
/// current page is near either end.
fn window(current: u32, last: u32) -> Vec<Option<u32>> {
    let side = ON_EACH_SIDE;
    let span = side + 4;

    if last < side * 2 + 8 {
        return (1..=last).map(Some).collect();
    }

    let head = [Some(1), Some(2), None];
    let tail = [None, Some(last - 1), Some(last)];

    if current <= span {
        (1..=span + side)
            .map(Some)
            .chain(tail)
            .collect()
    } else if current > last - span {
        head.into_iter()
            .chain((last - (span + side - 1)..=last).map(Some))
            .collect()
    } else {
        head.into_iter()
            .chain((current - side..=current + side).map(Some))
            .chain(tail)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig {
            per_page: 10,
            max_per_page: 50,
        }
    }

    fn page_of(items: &[u32], request: &PageRequest) -> Page<u32> {
        Page::new(request.slice(items), items.len() as u64, request)
    }

    fn numbers(slots: &[Option<u32>]) -> String {
        slots
            .iter()
            .map(|s| s.map_or_else(|| "..".to_owned(), |n| n.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_resolve_defaults() {
        let request = PageRequest::resolve(None, None, &config());
        assert_eq!((request.page(), request.per_page()), (1, 10));
    }

    #[test]
    fn test_resolve_is_lenient() {
        let cfg = config();
        assert_eq!(PageRequest::resolve(Some("0"), None, &cfg).page(), 1);
        assert_eq!(PageRequest::resolve(Some("-4"), None, &cfg).page(), 1);
        assert_eq!(PageRequest::resolve(Some("abc"), None, &cfg).page(), 1);
        assert_eq!(PageRequest::resolve(Some(" 3 "), None, &cfg).page(), 3);
        assert_eq!(PageRequest::resolve(None, Some("0"), &cfg).per_page(), 10);
        assert_eq!(PageRequest::resolve(None, Some("many"), &cfg).per_page(), 10);
        assert_eq!(PageRequest::resolve(None, Some("25"), &cfg).per_page(), 25);
        assert_eq!(PageRequest::resolve(None, Some("500"), &cfg).per_page(), 50);
    }

    #[test]
    fn test_twenty_five_items_in_pages_of_ten() {
        let items: Vec<u32> = (1..=25).collect();
        let page = page_of(&items, &PageRequest::new(3, 10));

        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.meta.last_page, 3);
        assert_eq!(page.meta.from, Some(21));
        assert_eq!(page.meta.to, Some(25));
        assert_eq!(page.meta.total, 25);
        assert_eq!(page.links.next, None);
        assert_eq!(page.links.prev.as_deref(), Some("?page=2&per_page=10"));
    }

    #[test]
    fn test_empty_collection_has_one_page() {
        let page = page_of(&[], &PageRequest::new(1, 10));
        assert!(page.data.is_empty());
        assert_eq!(page.meta.last_page, 1);
        assert_eq!(page.meta.from, None);
        assert_eq!(page.meta.to, None);
        assert_eq!(page.links.last, "?page=1&per_page=10");
    }

    #[test]
    fn test_page_past_the_end_is_empty_not_an_error() {
        let items: Vec<u32> = (1..=5).collect();
        let page = page_of(&items, &PageRequest::new(9, 10));
        assert!(page.data.is_empty());
        assert_eq!(page.meta.current_page, 9);
        assert_eq!(page.meta.last_page, 1);
        assert_eq!(page.meta.from, None);
    }

    #[test]
    fn test_pages_concatenate_to_the_whole_list() {
        let items: Vec<u32> = (1..=47).collect();
        for per_page in [1, 3, 10, 46, 47, 50] {
            let first = page_of(&items, &PageRequest::new(1, per_page));
            let mut seen = Vec::new();
            for n in 1..=first.meta.last_page {
                seen.extend(page_of(&items, &PageRequest::new(n, per_page)).data);
            }
            assert_eq!(seen, items, "per_page = {per_page}");
        }
    }

    #[test]
    fn test_edge_links_have_no_url() {
        let items: Vec<u32> = (1..=30).collect();
        let page = page_of(&items, &PageRequest::new(1, 10));
        let links = &page.meta.links;

        assert_eq!(links.len(), 5);
        assert_eq!(links[0].label, "« Previous");
        assert_eq!(links[0].url, None);
        assert!(links[1].active);
        assert_eq!(links[4].label, "Next »");
        assert_eq!(links[4].url.as_deref(), Some("?page=2&per_page=10"));
    }

    #[test]
    fn test_links_carry_filters() {
        let request = PageRequest::new(2, 5).with_query([("search", "war & peace".to_owned())]);
        assert_eq!(request.url(3), "?search=war+%26+peace&page=3&per_page=5");
    }

    #[test]
    fn test_short_paginator_lists_every_page() {
        assert_eq!(numbers(&window(5, 13)), "1 2 3 4 5 6 7 8 9 10 11 12 13");
    }

    #[test]
    fn test_window_near_start() {
        assert_eq!(numbers(&window(1, 20)), "1 2 3 4 5 6 7 8 9 10 .. 19 20");
        assert_eq!(numbers(&window(7, 20)), "1 2 3 4 5 6 7 8 9 10 .. 19 20");
    }

    #[test]
    fn test_window_in_the_middle() {
        assert_eq!(numbers(&window(10, 20)), "1 2 .. 7 8 9 10 11 12 13 .. 19 20");
    }

    #[test]
    fn test_window_near_end() {
        assert_eq!(numbers(&window(14, 20)), "1 2 .. 11 12 13 14 15 16 17 18 19 20");
        assert_eq!(numbers(&window(20, 20)), "1 2 .. 11 12 13 14 15 16 17 18 19 20");
    }

    #[test]
    fn test_map_keeps_meta() {
        let items: Vec<u32> = (1..=3).collect();
        let page = page_of(&items, &PageRequest::new(1, 2)).map(|n| n * 10);
        assert_eq!(page.data, vec![10, 20]);
        assert_eq!(page.meta.total, 3);
    }
}
