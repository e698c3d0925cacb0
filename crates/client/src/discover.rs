//! Sub-resource discovery in HTML documents.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// Kind of reference that pointed at a sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stylesheet,
    Script,
    Image,
}

/// A sub-resource referenced by the document, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubResource {
    pub url: Url,
    pub kind: ResourceKind,
}

/// Find stylesheet, script and image references in `html`.
///
/// Relative references resolve against the document's `<base href>` if
/// present, otherwise against `page_url` (which should be the post-redirect
/// URL). Fragments are dropped, results are deduplicated by absolute URL, and
/// only `http`/`https` targets are kept.
pub fn discover_resources(html: &str, page_url: &Url) -> Vec<SubResource> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let stylesheets = Selector::parse("link[rel][href]").expect("invalid selector");
    let scripts = Selector::parse("script[src]").expect("invalid selector");
    let images = Selector::parse("img[src]").expect("invalid selector");

    let candidates = document
        .select(&stylesheets)
        .filter(is_stylesheet)
        .filter_map(|el| el.value().attr("href").map(|r| (r, ResourceKind::Stylesheet)))
        .chain(
            document
                .select(&scripts)
                .filter_map(|el| el.value().attr("src").map(|r| (r, ResourceKind::Script))),
        )
        .chain(
            document
                .select(&images)
                .filter_map(|el| el.value().attr("src").map(|r| (r, ResourceKind::Image))),
        );

    let mut seen = HashSet::new();
    let mut resources = Vec::new();

    for (reference, kind) in candidates {
        let Some(url) = resolve(&base, reference) else {
            continue;
        };

        if seen.insert(url.to_string()) {
            resources.push(SubResource { url, kind });
        }
    }

    tracing::debug!("discovered {} sub-resources on {}", resources.len(), page_url);
    resources
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    let selector = Selector::parse("base[href]").expect("invalid selector");
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn is_stylesheet(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
}

fn resolve(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}
