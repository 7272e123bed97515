/// Themes shipped with the default asset tree.
pub const DEFAULT_THEMES: [&str; 4] = [
    "realistic-day",
    "realistic-night",
    "abstract-blue",
    "abstract-blue2",
];

/// Ordered list of selectable theme names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeCatalog {
    names: Vec<String>,
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_THEMES.iter().map(|name| name.to_string()).collect())
    }
}

impl ThemeCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// Theme after `current`, wrapping around. An unknown `current` selects
    /// the first theme.
    pub fn next_after(&self, current: Option<&str>) -> Option<&str> {
        let position = current.and_then(|name| self.names.iter().position(|known| known == name));
        match position {
            Some(index) => self.get((index + 1) % self.names.len()),
            None => self.first(),
        }
    }
}
