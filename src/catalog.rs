//! Read-only client for the post catalog served next to the site.
//!
//! The catalog is a static JSON array of post descriptors used to seed
//! baseline like counts and to render listing pages. Every operation here
//! is best-effort: a failed fetch or parse degrades to "no enrichment" and
//! must never block the page that asked.

use log::warn;
use regex::Regex;

use crate::app_response::AppResponse;
use crate::engagement_model::PostDescriptor;

/// Path of the catalog file relative to the site root.
pub const CATALOG_PATH: &str = "/pages/data/posts.json";

/// Blocking HTTP client for the catalog and for post-page image probes.
pub struct CatalogClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl CatalogClient {
    /// `base_url` is the site origin, e.g. `https://example.com`, without a
    /// trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Fetches and decodes the catalog. Callers treat any error as "no
    /// enrichment available".
    pub fn fetch_catalog(&self) -> Result<Vec<PostDescriptor>, AppResponse> {
        let url = format!("{}{CATALOG_PATH}", self.base_url);
        let response = self.http.get(&url).send()?;
        if !response.status().is_success() {
            return Err(AppResponse::NetworkError(format!(
                "Catalog fetch from '{url}' returned {}",
                response.status()
            )));
        }
        Ok(response.json()?)
    }

    /// Probes a post page for its first embedded image.
    ///
    /// Fetches `/pages/{slug}`, scans the HTML for the first `<img src>`
    /// and returns its URL with the site origin stripped. Any failure
    /// yields `None`.
    pub fn first_image_url(&self, slug: &str) -> Option<String> {
        let url = format!("{}/pages/{slug}", self.base_url);
        let html = match self
            .http
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
        {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not probe '{slug}' for an image: {e}");
                return None;
            }
        };

        extract_first_image(&html).map(|src| match src.strip_prefix(&self.base_url) {
            Some(path) => path.to_string(),
            None => src,
        })
    }

    /// Fills in missing `image` fields across a listing, one best-effort
    /// probe per post. Placeholder slugs (`#`) are skipped.
    pub fn enrich_images(&self, posts: &mut [PostDescriptor]) {
        for post in posts.iter_mut() {
            if post.image.is_none() && !post.slug.is_empty() && post.slug != "#" {
                post.image = self.first_image_url(&post.slug);
            }
        }
    }
}

/// Decodes a raw catalog document. Split out from the fetch so the parse
/// rules are testable offline.
pub fn parse_catalog(raw: &str) -> Result<Vec<PostDescriptor>, AppResponse> {
    Ok(serde_json::from_str(raw)?)
}

/// Baseline like count the catalog lists for `slug`; absent posts read
/// as zero.
pub fn baseline_likes(catalog: &[PostDescriptor], slug: &str) -> u64 {
    catalog
        .iter()
        .find(|post| post.slug == slug)
        .map(|post| post.likes)
        .unwrap_or(0)
}

/// First `<img src>` value in an HTML document, if any.
pub fn extract_first_image(html: &str) -> Option<String> {
    let pattern = match Regex::new(r#"<img[^>]*\ssrc\s*=\s*["']([^"']+)["']"#) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!("Image pattern failed to compile: {e}");
            return None;
        }
    };
    pattern
        .captures(html)
        .map(|captures| captures[1].to_string())
}
