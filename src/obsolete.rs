use anyhow::Result;
use tracing::debug;

use crate::gallery::{GalleryStore, GalleryValue};

/// Find image rows of the product media gallery that no product links to.
///
/// Nothing is deleted here; see [`crate::deleter::GalleryDeleter`].
pub fn find_obsolete_values(gallery: &dyn GalleryStore) -> Result<Vec<GalleryValue>> {
    let attribute_id = gallery.media_gallery_attribute_id()?;
    debug!("media_gallery attribute id: {}", attribute_id);

    let values = gallery.unlinked_values(attribute_id)?;
    debug!("{} unlinked gallery value(s)", values.len());
    Ok(values)
}
