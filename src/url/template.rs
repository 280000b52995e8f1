use crate::UrlError;
use url::Url;

/// Placeholder replaced by the page number
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder replaced by the configured page size
pub const PAGE_SIZE_PLACEHOLDER: &str = "{page_size}";

/// Builds the listing URL for one catalog page
///
/// # Arguments
///
/// * `template` - URL containing `{page}` and optionally `{page_size}`
/// * `page` - The 1-based page number
/// * `page_size` - Products per page
///
/// # Returns
///
/// * `Ok(Url)` - The absolute HTTP(S) page URL
/// * `Err(UrlError)` - The template lacks `{page}` or does not form a valid URL
///
/// # Examples
///
/// ```
/// use catalog_crawler::url::build_page_url;
///
/// let url = build_page_url("https://shop.example.com/cards?p={page}&limit={page_size}", 3, 36).unwrap();
/// assert_eq!(url.as_str(), "https://shop.example.com/cards?p=3&limit=36");
/// ```
pub fn build_page_url(template: &str, page: u32, page_size: u32) -> Result<Url, UrlError> {
    if !template.contains(PAGE_PLACEHOLDER) {
        return Err(UrlError::MissingPagePlaceholder(template.to_string()));
    }

    let raw = template
        .replace(PAGE_PLACEHOLDER, &page.to_string())
        .replace(PAGE_SIZE_PLACEHOLDER, &page_size.to_string());

    let url = Url::parse(&raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    Ok(url)
}
