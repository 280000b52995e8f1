use serde::{Deserialize, Serialize};

/// A single product entry extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Cleaned display name
    pub name: String,

    /// Price in the store's currency, always positive
    pub price: f64,

    /// Product page on the store (empty if the entry had no link)
    pub store_url: String,

    /// Product image (placeholder if the entry had none)
    #[serde(default)]
    pub image_url: String,
}

impl ProductRecord {
    /// Returns the deduplication key of this record
    pub fn identity_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Computes the identity key of a product name
///
/// The key is case-folded and ignores punctuation and whitespace, so
/// "Jace, the Mind Sculptor" and "jace the mind-sculptor" collide.
///
/// # Examples
///
/// ```
/// use catalog_crawler::catalog::normalize_name;
///
/// assert_eq!(normalize_name("Jace, the Mind Sculptor"), "jacethemindsculptor");
/// assert_eq!(normalize_name("Sol  Ring!"), normalize_name("sol ring"));
/// ```
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Cleans a raw product name as rendered by the store
///
/// Bracketed qualifiers such as `(Enkeltkort)` or `[Foil]` are removed and
/// runs of whitespace collapse to a single space.
///
/// # Examples
///
/// ```
/// use catalog_crawler::catalog::clean_name;
///
/// assert_eq!(clean_name("  Sol Ring (Enkeltkort) [Commander 2021] "), "Sol Ring");
/// ```
pub fn clean_name(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut depth = 0usize;

    for c in raw.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                stripped.push(' ');
            }
            ')' | ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
