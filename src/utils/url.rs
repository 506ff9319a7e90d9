// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::Result;

/// Build the URL of a listing page by setting the page query parameter.
///
/// An existing value for the parameter is replaced, other query pairs are
/// kept in order.
///
/// # Examples
/// ```
/// use harvester::utils::url::page_url;
///
/// assert_eq!(
///     page_url("https://example.com/search?location=uk", "page", 2).unwrap(),
///     "https://example.com/search?location=uk&page=2"
/// );
/// ```
pub fn page_url(base_url: &str, page_param: &str, page_number: u32) -> Result<String> {
    let mut url = Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != page_param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(page_param, &page_number.to_string());

    Ok(url.to_string())
}

/// Resolve a potentially relative URL against a base URL.
///
/// Falls back to `href` unchanged when the base does not parse.
pub fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
