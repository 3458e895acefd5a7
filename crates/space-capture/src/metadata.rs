use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tags embedded into the output container.
///
/// Entries are kept sorted by name so the generated transcoder arguments are
/// identical for identical input. Entries whose value is empty (or only
/// whitespace) are kept but never emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataTags(BTreeMap<String, String>);

impl MetadataTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries that will actually be embedded.
    pub fn effective(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(key, value)| !key.is_empty() && !value.trim().is_empty())
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataTags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_skips_blank_values_in_key_order() {
        let tags: MetadataTags = [
            ("title", "Morning space"),
            ("artist", "host"),
            ("comment", ""),
            ("album", "   "),
        ]
        .into_iter()
        .collect();

        let effective: Vec<_> = tags.effective().collect();
        assert_eq!(effective, vec![("artist", "host"), ("title", "Morning space")]);
        assert_eq!(tags.len(), 4);
    }
}
