use url::Url;

/// Resolves an `href`/`src` value to an absolute URL string
///
/// Returns None if the value should be ignored:
/// - empty or fragment-only values
/// - `javascript:`, `mailto:`, `tel:` and `data:` schemes
/// - values that do not resolve to an HTTP(S) URL
///
/// Without a base URL, only values that are already absolute are accepted.
pub fn resolve_link(href: &str, base_url: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = match base_url {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Some(resolved.to_string())
    } else {
        None
    }
}
