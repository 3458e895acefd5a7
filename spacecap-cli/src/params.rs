use space_capture::MetadataTags;
use tracing::debug;

use crate::error::AppError;

/// Parse repeated `key=value` options into metadata tags.
///
/// Only the first `=` separates key from value, so values may contain `=`.
/// A later duplicate key replaces the earlier one.
pub fn parse_metadata(params: &[String]) -> Result<MetadataTags, AppError> {
    let mut tags = MetadataTags::new();
    for param in params {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid metadata format: {param}")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Metadata key must not be empty: {param}"
            )));
        }
        debug!("Added metadata: key='{key}', value='{value}'");
        tags.insert(key, value);
    }
    Ok(tags)
}
