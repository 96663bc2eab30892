//! URL construction from an API target

use crate::config::ApiConfig;
use crate::json::Id;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Query parameters in insertion order
///
/// Setting a key that is already present replaces its value in place, so
/// layered configs keep the position a key was first given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// No parameters
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `key`, keeping its position if already present
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    /// Value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for QueryParams {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, pairs: I) {
        for (key, value) in pairs {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        let mut params = Self::new();
        params.extend(pairs);
        params
    }
}

impl Serialize for QueryParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for QueryParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = QueryParams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of query parameters")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<QueryParams, M::Error> {
                let mut params = QueryParams::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    params.insert(key, value);
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

/// Build the request URL for a target and an optional record id
///
/// `api.url` is returned verbatim when set. Otherwise the non-empty
/// segments domain, path, name, id and suffix are joined, each ending in
/// exactly one slash, and the query string is appended. The id is
/// percent-encoded; the other segments are taken as given.
///
/// ```
/// use composable_rest::config::ApiConfig;
/// use composable_rest::json::Id;
/// use composable_rest::url::build;
///
/// let api = ApiConfig::new("http://localhost/", "pets");
/// assert_eq!(build(&api, Some(&Id::Number(3))), "http://localhost/pets/3/");
/// ```
#[must_use]
pub fn build(api: &ApiConfig, id: Option<&Id>) -> String {
    if let Some(url) = &api.url {
        return url.clone();
    }

    let id = id.map(|id| urlencoding::encode(&id.to_string()).into_owned());
    let mut url = [
        api.domain.as_deref(),
        api.path.as_deref(),
        api.name.as_deref(),
        id.as_deref(),
        api.suffix.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|segment| !segment.is_empty())
    .fold(String::new(), |mut url, segment| {
        url.push_str(segment);
        if !segment.ends_with('/') {
            url.push('/');
        }
        url
    });

    url.push_str(&query_string(&api.params));
    url
}

/// `?k=v&...` in insertion order with keys and values percent-encoded;
/// empty for no params
#[must_use]
pub fn query_string(params: &QueryParams) -> String {
    if params.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect();
    format!("?{}", pairs.join("&"))
}
