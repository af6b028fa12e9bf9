//! Canonical request paths
//!
//! The gate classifies and proxies one form of the request path: percent
//! decoded, `\` read as `/`, empty and `.` segments dropped and `..` resolved.
//! The guard and the upstream both see the same segments re-encoded one by
//! one, so what the guard matched is exactly what the UI serves.

use once_cell::sync::Lazy;
use regex::Regex;

static CONTROL_CHARACTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1F\x7F]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '/'")]
    NotAbsolute,
    #[error("path is not valid UTF-8 once decoded")]
    InvalidEncoding,
    #[error("path contains control characters")]
    ControlCharacters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    segments: Vec<String>,
    trailing_slash: bool,
    query: Option<String>,
}

impl CanonicalPath {
    /// Canonicalize the path and carry the raw query along
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] for relative paths, invalid UTF-8 after
    /// decoding, or control characters
    pub fn parse(path: &str, query: Option<&str>) -> Result<Self, PathError> {
        if !path.starts_with('/') {
            return Err(PathError::NotAbsolute);
        }
        let decoded = urlencoding::decode(path).map_err(|_| PathError::InvalidEncoding)?;
        if CONTROL_CHARACTERS.is_match(&decoded) {
            return Err(PathError::ControlCharacters);
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in decoded.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                segment => segments.push(segment.to_string()),
            }
        }
        let trailing_slash = !segments.is_empty() && decoded.ends_with(['/', '\\']);

        Ok(Self {
            segments,
            trailing_slash,
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Decoded path the route rules match against
    #[must_use]
    pub fn route(&self) -> String {
        self.render(|segment| segment.to_string())
    }

    /// Encoded path plus query, what the guard evaluates and what the login
    /// return parameter carries
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.upstream_path()),
            None => self.upstream_path(),
        }
    }

    /// Percent-encoded path sent upstream
    #[must_use]
    pub fn upstream_path(&self) -> String {
        self.render(|segment| urlencoding::encode(segment).into_owned())
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn render(&self, encode: impl Fn(&str) -> String) -> String {
        let mut rendered = String::from("/");
        rendered.push_str(
            &self
                .segments
                .iter()
                .map(|segment| encode(segment))
                .collect::<Vec<_>>()
                .join("/"),
        );
        if self.trailing_slash {
            rendered.push('/');
        }
        rendered
    }
}
