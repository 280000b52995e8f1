//! Product records and the deduplicated catalog they accumulate into

mod accumulated;
mod record;

pub use accumulated::{AccumulatedCatalog, CatalogMetadata};
pub use record::{clean_name, normalize_name, ProductRecord};
