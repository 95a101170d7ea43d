//! Client-side note search and tag filtering

use crate::types::Note;
use std::collections::BTreeMap;

/// Canonical form of a tag name: lowercase, whitespace runs become `-`
pub fn tag_slug(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Search text plus selected tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    query: String,
    tags: Vec<String>,
}

impl NoteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring over title and content
    pub fn query(mut self, query: impl AsRef<str>) -> Self {
        self.query = query.as_ref().trim().to_lowercase();
        self
    }

    /// Select a tag; a note matches when it carries any selected tag
    pub fn tag(mut self, tag: impl AsRef<str>) -> Self {
        let slug = tag_slug(tag.as_ref());
        if !slug.is_empty() && !self.tags.contains(&slug) {
            self.tags.push(slug);
        }
        self
    }

    pub fn tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter().fold(self, |filter, tag| filter.tag(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.tags.is_empty()
    }

    pub fn matches(&self, note: &Note) -> bool {
        let text_matches = self.query.is_empty()
            || note.title.to_lowercase().contains(&self.query)
            || note.content.to_lowercase().contains(&self.query);

        let tag_matches = self.tags.is_empty()
            || note
                .tags_display
                .iter()
                .any(|tag| self.tags.contains(&tag_slug(tag)));

        text_matches && tag_matches
    }

    /// Notes that match, in their original order
    pub fn apply<'a>(&self, notes: &'a [Note]) -> Vec<&'a Note> {
        notes.iter().filter(|note| self.matches(note)).collect()
    }
}

/// A tag option offered for filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOption {
    pub slug: String,
    pub label: String,
}

/// Unique tags across `notes`, keyed by slug; the first spelling seen wins
pub fn available_tags(notes: &[Note]) -> Vec<TagOption> {
    let mut options = BTreeMap::new();
    for tag in notes.iter().flat_map(|note| &note.tags_display) {
        options
            .entry(tag_slug(tag))
            .or_insert_with(|| tag.clone());
    }

    options
        .into_iter()
        .map(|(slug, label)| TagOption { slug, label })
        .collect()
}
