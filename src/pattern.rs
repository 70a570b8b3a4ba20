/* src/pattern.rs */

use crate::error::RouteError;
use regex::Regex;
use std::sync::LazyLock;

/// Finds `/:name` capture segments inside a route template.
static CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/:([^:/]+)").expect("capture regex is valid"));

/// A compiled route template such as `/user/:country/:id/view`.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    matcher: Regex,
    names: Vec<String>,
}

impl RoutePattern {
    /// Gets the template the pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Gets the variable names in the order they appear in the template.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Matches a query-free path, returning one captured value per variable.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let caps = self.matcher.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map_or("", |m| m.as_str()))
                .collect(),
        )
    }

    /// Matches a path and pairs every captured value with its variable name.
    pub fn params(&self, path: &str) -> Option<Vec<(String, String)>> {
        let values = self.captures(path)?;
        Some(
            self.names
                .iter()
                .cloned()
                .zip(values.into_iter().map(str::to_string))
                .collect(),
        )
    }

    /// Returns true if the path matches the pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// Compiles a route template into a [`RoutePattern`].
///
/// Every `/:name` segment becomes a single-segment capture; everything else is
/// matched literally. The matcher is anchored at both ends, so `/user/name`
/// does not match `/api/user/name`.
pub fn compile(template: &str) -> Result<RoutePattern, RouteError> {
    let mut source = String::with_capacity(template.len() + 8);
    let mut names = Vec::new();
    let mut last = 0;

    source.push('^');
    for caps in CAPTURE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        source.push_str(&regex::escape(&template[last..whole.start()]));
        source.push_str("/([^/]+)");
        names.push(name.as_str().to_string());
        last = whole.end();
    }
    source.push_str(&regex::escape(&template[last..]));
    source.push('$');

    let matcher = Regex::new(&source).map_err(|e| RouteError::InvalidTemplate {
        template: template.to_string(),
        reason: e.to_string(),
    })?;

    Ok(RoutePattern {
        template: template.to_string(),
        matcher,
        names,
    })
}
