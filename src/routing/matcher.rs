//! Path patterns and target templates.
//!
//! # Responsibilities
//! - Parse inbound path patterns (`/api/v2/tasks/{id}`, `/files/{*rest}`)
//! - Match request paths segment by segment, capturing parameters
//! - Render backend target templates from captured parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Captured values are substituted verbatim (no decoding or re-encoding)
//! - `{*rest}` is only valid as the last segment and may capture nothing
//! - No regex, matching is a single pass over the segments

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest(String),
}

/// A compiled inbound path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Parameters captured by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| format!("pattern `{}` must start with `/`", raw))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.into_iter().enumerate() {
                let segment = match placeholder(part)? {
                    Some(name) if name.starts_with('*') => {
                        if i != last {
                            return Err(format!("`{}`: wildcard must be the last segment", raw));
                        }
                        Segment::Rest(name[1..].to_string())
                    }
                    Some(name) => Segment::Param(name.to_string()),
                    None if part.is_empty() => {
                        return Err(format!("`{}`: empty path segment", raw));
                    }
                    None => Segment::Literal(part.to_string()),
                };
                segments.push(segment);
            }
        }

        let mut seen = Vec::new();
        for name in segments.iter().filter_map(capture_name) {
            if name.is_empty() {
                return Err(format!("`{}`: unnamed parameter", raw));
            }
            if seen.contains(&name) {
                return Err(format!("`{}`: duplicate parameter `{}`", raw, name));
            }
            seen.push(name);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path` (without query) and return the captures.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut params = Params::default();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i).filter(|v| !v.is_empty())?;
                    params.insert(name.as_str(), *value);
                }
                Segment::Rest(name) => {
                    let tail = parts.get(i..).map(|t| t.join("/")).unwrap_or_default();
                    params.insert(name.as_str(), tail);
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    /// Number of literal segments before the first capture.
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Rest(_)))
    }

    /// Ordering key; greater is more specific.
    pub fn specificity(&self) -> (usize, usize, bool, usize) {
        (
            self.literal_prefix_len(),
            self.literal_count(),
            !self.has_wildcard(),
            self.segments.len(),
        )
    }

    /// Pattern with parameter names erased; equal shapes match the same paths.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(_) => out.push_str("{}"),
                Segment::Rest(_) => out.push_str("{*}"),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(capture_name)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn capture_name(segment: &Segment) -> Option<&str> {
    match segment {
        Segment::Param(name) | Segment::Rest(name) => Some(name.as_str()),
        Segment::Literal(_) => None,
    }
}

/// `{name}` → `Some("name")`, literal → `None`.
fn placeholder(part: &str) -> Result<Option<&str>, String> {
    match (part.starts_with('{'), part.ends_with('}')) {
        (true, true) if part.len() >= 2 => Ok(Some(&part[1..part.len() - 1])),
        (false, false) if !part.contains(['{', '}']) => Ok(None),
        _ => Err(format!("malformed segment `{}`", part)),
    }
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Var(String),
}

/// A backend path template such as `/api/v2/tasks/{id}:cancel`.
#[derive(Debug, Clone)]
pub struct TargetTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl TargetTemplate {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if !raw.starts_with('/') {
            return Err(format!("target `{}` must start with `/`", raw));
        }
        if raw.contains(['?', '#']) {
            return Err(format!("target `{}` must not contain a query or fragment", raw));
        }

        let mut parts = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            if rest[..open].contains('}') {
                return Err(format!("target `{}`: unbalanced `}}`", raw));
            }
            if open > 0 {
                parts.push(Part::Text(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .ok_or_else(|| format!("target `{}`: unclosed `{{`", raw))?
                + open;
            let name = rest[open + 1..close].trim_start_matches('*');
            if name.is_empty() {
                return Err(format!("target `{}`: unnamed parameter", raw));
            }
            parts.push(Part::Var(name.to_string()));
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(format!("target `{}`: unbalanced `}}`", raw));
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Var(name) => Some(name.as_str()),
            Part::Text(_) => None,
        })
    }

    /// Substitute `params`. Unknown variables render empty; the route
    /// compiler rejects templates that reference names the pattern lacks.
    pub fn render(&self, params: &Params) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Var(name) => out.push_str(params.get(name).unwrap_or_default()),
            }
        }
        // An empty wildcard capture must not leave a dangling slash
        if out.len() > 1 && out.ends_with('/') && !self.raw.ends_with('/') {
            out.pop();
        }
        out
    }
}
