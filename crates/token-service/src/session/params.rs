//! Ordered multimap of OAuth request parameters.

use serde::{Deserialize, Serialize};

/// Form or query parameters, keys in first-seen order, values in arrival order.
///
/// This is what gets stashed as the session's return URI: the authorize
/// request is rebuilt from it verbatim once the user has confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormParams(Vec<(String, Vec<String>)>);

impl FormParams {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse an `application/x-www-form-urlencoded` string (query or body).
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut params = Self::new();
        params.extend_encoded(input);
        params
    }

    /// Append every pair of an urlencoded string.
    pub fn extend_encoded(&mut self, input: &str) {
        for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
            self.append(key.into_owned(), value.into_owned());
        }
    }

    /// Append a value under `key`, keeping any earlier values.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values for `key`, empty if absent.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(key, value)` pairs in order, repeating keys with several values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Render back to an urlencoded string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.append(key, value);
        }
        params
    }
}
