use regex_lite::Regex;

/// An index name or a glob pattern (`*` and `?` wildcards).
#[derive(Debug, Clone)]
pub struct IndexPattern {
    raw: String,
    glob: Option<Regex>,
}

impl IndexPattern {
    /// Returns `None` when the pattern cannot be compiled.
    pub fn new(raw: &str) -> Option<Self> {
        let glob = if raw.contains(['*', '?']) {
            let mut expr = String::with_capacity(raw.len() + 8);
            expr.push('^');
            for c in raw.chars() {
                match c {
                    '*' => expr.push_str(".*"),
                    '?' => expr.push('.'),
                    other => expr.push_str(&regex_lite::escape(&other.to_string())),
                }
            }
            expr.push('$');
            Some(Regex::new(&expr).ok()?)
        } else {
            None
        };

        Some(Self {
            raw: raw.to_string(),
            glob,
        })
    }

    pub fn is_wildcard(&self) -> bool {
        self.glob.is_some()
    }

    pub fn matches(&self, index: &str) -> bool {
        match &self.glob {
            Some(re) => re.is_match(index),
            None => self.raw == index,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
