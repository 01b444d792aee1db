/// Drops writes containing any configured substring.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<String>,
}

impl ExcludeFilter {
    pub fn new(patterns: impl IntoIterator<Item = String>) -> Self {
        Self {
            patterns: patterns.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// Whether `text` may be forwarded.
    pub fn admits(&self, text: &str) -> bool {
        !self.patterns.iter().any(|p| text.contains(p.as_str()))
    }
}
