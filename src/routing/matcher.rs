//! Route source matching.
//!
//! # Responsibilities
//! - Compile express-style path patterns (`/post/:id`, `/files/*`) to regexes
//! - Match request paths and extract named and positional captures
//!
//! # Design Decisions
//! - Matching is case-insensitive and tolerates one trailing slash
//! - `:name?` makes the whole segment optional
//! - `*` captures greedily under positional keys `"0"`, `"1"`, ...
//! - Regex sources: named groups keep their name, the rest are positional
//! - Captures are percent-decoded; undecodable ones are kept raw

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};

use crate::http::RouteParams;
use crate::routing::route_item::RouteSource;

#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
    keys: Vec<String>,
}

impl PathMatcher {
    pub fn new(source: &RouteSource) -> Result<Self, regex::Error> {
        match source {
            RouteSource::Path(pattern) => Self::from_pattern(pattern),
            RouteSource::Regex(regex) => Ok(Self::from_regex(regex.clone())),
        }
    }

    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        let (source, keys) = compile_pattern(pattern);
        let regex = RegexBuilder::new(&source).case_insensitive(true).build()?;
        Ok(Self { regex, keys })
    }

    pub fn from_regex(regex: Regex) -> Self {
        let mut positional = 0usize;
        let keys = regex
            .capture_names()
            .skip(1)
            .map(|name| match name {
                Some(name) => name.to_string(),
                None => {
                    let key = positional.to_string();
                    positional += 1;
                    key
                }
            })
            .collect();
        Self { regex, keys }
    }

    /// Captured parameters when `path` matches.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let caps = self.regex.captures(path)?;
        let mut params = RouteParams::new();
        for (idx, key) in self.keys.iter().enumerate() {
            if let Some(m) = caps.get(idx + 1) {
                params.insert(key.clone(), decode(m.as_str()));
            }
        }
        Some(params)
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Translate an express path into an anchored regex source and its capture
/// keys.
fn compile_pattern(pattern: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = pattern.trim_end_matches('/').chars().collect();
    let mut out = String::from("^");
    let mut keys = Vec::new();
    let mut positional = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let param_follows = c == '/' && chars.get(i + 1) == Some(&':');
        if c == ':' || param_follows {
            let start = if param_follows { i + 2 } else { i + 1 };
            let mut end = start;
            while end < chars.len() && is_name_char(chars[end]) {
                end += 1;
            }
            if end == start {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
                continue;
            }
            let name: String = chars[start..end].iter().collect();
            let optional = chars.get(end) == Some(&'?');
            let slash = if param_follows { "/" } else { "" };
            if optional {
                out.push_str(&format!("(?:{}([^/]+?))?", slash));
                end += 1;
            } else {
                out.push_str(&format!("{}([^/]+?)", slash));
            }
            keys.push(name);
            i = end;
        } else if c == '*' {
            out.push_str("(.*)");
            keys.push(positional.to_string());
            positional += 1;
            i += 1;
        } else {
            out.push_str(&regex::escape(&c.to_string()));
            i += 1;
        }
    }

    out.push_str("/?$");
    (out, keys)
}
