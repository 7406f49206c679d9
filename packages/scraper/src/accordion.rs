//! Accordion section splitter.
//!
//! The portal renders collapsible sections as a flat run of sibling nodes
//! inside a container: a heading, one structural node, then the section
//! content. [`Accordion::split`] pairs every heading with its content and
//! keys the result by the trimmed heading text. [`Accordion::by_country`]
//! additionally collapses decorated labels such as `"Austria - Part II"` to
//! the bare country name.

use std::collections::BTreeMap;

use scraper::ElementRef;

use crate::{ExtractError, element_text};

/// Tag of the nodes that open a new section.
pub const SECTION_HEADING_TAG: &str = "h3";

/// Position of a section's content relative to its heading, counted in
/// sibling nodes (text nodes included). The portal emits exactly one node in
/// between, so the content is the second sibling after the heading.
///
/// This is the first thing to revisit when the portal changes its markup.
pub const HEADING_CONTENT_OFFSET: usize = 2;

/// Separator between the country name and any decoration in a per-country
/// section label.
pub const COUNTRY_LABEL_SEPARATOR: char = '-';

/// Sections of an accordion keyed by label.
///
/// Display order is not preserved; sections are only ever looked up by key.
#[derive(Debug, Clone, Default)]
pub struct Accordion<'a> {
    sections: BTreeMap<String, ElementRef<'a>>,
}

impl<'a> Accordion<'a> {
    /// Splits the direct children of `container` into labelled sections.
    ///
    /// Children that are not section headings are ignored. When two headings
    /// share a label the later one wins.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::UnexpectedPageFormat`] if a heading is not
    /// followed by a content element at [`HEADING_CONTENT_OFFSET`].
    pub fn split(container: ElementRef<'a>) -> Result<Self, ExtractError> {
        Self::collect(container, |label| label)
    }

    /// Splits a per-country accordion, keying each section by
    /// [`country_key`] of its label. Collisions are resolved like in
    /// [`Accordion::split`], in display order.
    ///
    /// # Errors
    ///
    /// Same as [`Accordion::split`].
    pub fn by_country(container: ElementRef<'a>) -> Result<Self, ExtractError> {
        Self::collect(container, country_key)
    }

    fn collect(
        container: ElementRef<'a>,
        key: impl Fn(&str) -> &str,
    ) -> Result<Self, ExtractError> {
        let mut sections = BTreeMap::new();

        for child in container.children() {
            let Some(heading) = ElementRef::wrap(child) else {
                continue;
            };
            if heading.value().name() != SECTION_HEADING_TAG {
                continue;
            }

            let label = element_text(heading);
            let content = heading
                .next_siblings()
                .nth(HEADING_CONTENT_OFFSET - 1)
                .and_then(ElementRef::wrap)
                .ok_or_else(|| {
                    ExtractError::unexpected(format!(
                        "section heading '{label}' is not followed by a content element"
                    ))
                })?;

            if sections.insert(key(&label).to_owned(), content).is_some() {
                log::warn!("Accordion section '{label}' replaces an earlier section");
            }
        }

        Ok(Self { sections })
    }

    /// Looks up a section by label.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::SectionNotFound`] if there is no such section.
    pub fn section(&self, label: &str) -> Result<ElementRef<'a>, ExtractError> {
        self.get(label)
            .ok_or_else(|| ExtractError::SectionNotFound {
                section: label.to_owned(),
            })
    }

    /// Looks up a section by label, returning `None` if absent.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<ElementRef<'a>> {
        self.sections.get(label).copied()
    }

    /// Iterates over the section labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Iterates over `(label, content)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ElementRef<'a>)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns `true` if no section was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Strips the decoration from a per-country section label.
///
/// `"France - legacy"` becomes `"France"`; an undecorated label is returned
/// trimmed.
#[must_use]
pub fn country_key(label: &str) -> &str {
    label
        .split(COUNTRY_LABEL_SEPARATOR)
        .next()
        .unwrap_or(label)
        .trim()
}
