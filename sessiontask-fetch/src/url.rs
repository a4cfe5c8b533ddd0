//! Request address building.
//!
//! Turns a task's identity (base URL, path template, path substitutions,
//! params and pagination) into the address handed to the transport. Building
//! is pure: the same inputs always produce the same strings.

use sessiontask_core::Params;
use url::form_urlencoded;

/// Addresses derived from one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltUrl {
    /// Base URL plus path, without query.
    pub endpoint: String,
    /// Endpoint plus encoded query; the task's identity.
    pub absolute: String,
    /// Params after pagination was folded in.
    pub params: Params,
}

/// Builder for a task's request address.
#[derive(Debug, Clone)]
pub struct UrlBuilder<'a> {
    base_url: &'a str,
    path: &'a str,
    substitutions: &'a [String],
    params: &'a Params,
    pagination: Vec<(&'a str, u32)>,
}

impl<'a> UrlBuilder<'a> {
    /// Starts a build from a base URL, path template and params.
    pub fn new(base_url: &'a str, path: &'a str, params: &'a Params) -> Self {
        Self {
            base_url,
            path,
            substitutions: &[],
            params,
            pagination: Vec::new(),
        }
    }

    /// Sets the ordered path substitutions.
    pub fn substitutions(mut self, substitutions: &'a [String]) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Folds a pagination value into the params under `name`.
    pub fn pagination(mut self, name: &'a str, value: Option<u32>) -> Self {
        if let Some(value) = value {
            self.pagination.push((name, value));
        }
        self
    }

    /// Builds the endpoint and absolute URL.
    pub fn build(&self) -> BuiltUrl {
        let endpoint = join(self.base_url, &substitute_path(self.path, self.substitutions));

        let mut params = self.params.clone();
        for (name, value) in &self.pagination {
            params.set(*name, value.to_string());
        }

        let absolute = if params.is_empty() {
            endpoint.clone()
        } else {
            format!("{endpoint}?{}", encode_query(&params))
        };

        BuiltUrl {
            endpoint,
            absolute,
            params,
        }
    }
}

/// Applies substitutions to the placeholder segments of `path` in order.
///
/// Placeholders are `:name` or `{name}` segments. Substitutions left over
/// once every placeholder is filled are appended as extra segments.
pub fn substitute_path(path: &str, substitutions: &[String]) -> String {
    if substitutions.is_empty() {
        return path.to_string();
    }

    let mut remaining = substitutions.iter();
    let mut segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            if is_placeholder(segment) {
                match remaining.next() {
                    Some(value) => urlencoding::encode(value).into_owned(),
                    None => segment.to_string(),
                }
            } else {
                segment.to_string()
            }
        })
        .collect();

    let extra = remaining.as_slice();
    if !extra.is_empty() && segments.len() > 1 && segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }
    for value in extra {
        segments.push(urlencoding::encode(value).into_owned());
    }

    segments.join("/")
}

/// Form-encodes params in insertion order.
pub fn encode_query(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter() {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn is_placeholder(segment: &str) -> bool {
    (segment.len() > 1 && segment.starts_with(':'))
        || (segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}'))
}

fn join(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

// ============================================================================
// Tests
// ============================================================================
