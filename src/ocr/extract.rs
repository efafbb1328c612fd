use super::Page;

pub const NO_TEXT_FOUND: &str = "No text found";

/// Lines joined with newlines, then pages joined with newlines.
pub fn flatten_pages(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|page| page.lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pages: Vec<Page>,
    text: String,
}

impl Extraction {
    pub fn from_pages(pages: Vec<Page>) -> Self {
        let text = flatten_pages(&pages);
        Self { pages, text }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Raw flattened text, possibly empty.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn display_text(&self) -> &str {
        if self.is_empty() {
            NO_TEXT_FOUND
        } else {
            &self.text
        }
    }
}
