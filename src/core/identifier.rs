//! Hierarchical group identifiers and the templates that produce them.
//!
//! A [`ResourceGroupId`] is a dot-separated path such as `global.adhoc.alice`.
//! A [`ResourceGroupIdTemplate`] is the same shape, but any segment may carry
//! `${NAME}` placeholders that are bound per query (for example
//! `global.${USER}` or `bi-${toolname}`).

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{ResourceGroupError, Result};

const SEPARATOR: char = '.';

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid template variable regex")
});

/// Immutable hierarchical path naming a resource group.
///
/// Ordering and equality are structural over the segments, so a parent
/// always sorts before its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceGroupId {
    segments: Vec<String>,
}

impl ResourceGroupId {
    /// Build an identifier from owned segments.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] when there are no
    /// segments or a segment is empty or contains `.`.
    pub fn from_segments(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(
                "identifier has no segments".into(),
            ));
        }
        for segment in &segments {
            validate_segment(segment, &segments)?;
        }
        Ok(Self { segments })
    }

    /// Parse the textual `a.b.c` form.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] on an empty string or
    /// an empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(
                "identifier is empty".into(),
            ));
        }
        Self::from_segments(text.split(SEPARATOR).map(str::to_string).collect())
    }

    /// Identifier of a root group.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] for an invalid name.
    pub fn root(name: impl Into<String>) -> Result<Self> {
        Self::from_segments(vec![name.into()])
    }

    /// Identifier of a direct child of this group.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] for an invalid name.
    pub fn child(&self, name: impl Into<String>) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self::from_segments(segments)
    }

    /// Path segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Number of segments; a root has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this identifier names a root group.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Parent identifier, `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Identifier of the root this group hangs under.
    #[must_use]
    pub fn root_id(&self) -> Self {
        Self {
            segments: self.segments[..1].to_vec(),
        }
    }

    /// Strict structural prefix test.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Every prefix of this identifier, root first, ending with `self`.
    #[must_use]
    pub fn path_from_root(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }
}

fn validate_segment(segment: &str, all: &[String]) -> Result<()> {
    if segment.is_empty() {
        return Err(ResourceGroupError::InvalidIdentifier(format!(
            "empty segment in `{}`",
            all.join(".")
        )));
    }
    if segment.contains(SEPARATOR) {
        return Err(ResourceGroupError::InvalidIdentifier(format!(
            "segment `{segment}` contains `{SEPARATOR}`"
        )));
    }
    Ok(())
}

impl fmt::Display for ResourceGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl TryFrom<String> for ResourceGroupId {
    type Error = ResourceGroupError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ResourceGroupId> for String {
    fn from(value: ResourceGroupId) -> Self {
        value.to_string()
    }
}

/// Piece of a segment template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TemplatePart {
    Literal(String),
    Variable(String),
}

/// One segment of a template: literal text mixed with `${NAME}` placeholders.
///
/// Group specifications use segment templates as their names, so two
/// templates are equal when their parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentTemplate {
    parts: Vec<TemplatePart>,
}

impl SegmentTemplate {
    /// Parse a single segment.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] on an empty segment,
    /// a `.` in the segment, or an unterminated `${`.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(
                "empty template segment".into(),
            ));
        }
        if text.contains(SEPARATOR) {
            return Err(ResourceGroupError::InvalidIdentifier(format!(
                "template segment `{text}` contains `{SEPARATOR}`"
            )));
        }

        let mut parts = Vec::new();
        let mut last = 0;
        for captures in VARIABLE.captures_iter(text) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > last {
                push_literal(&mut parts, &text[last..whole.start()])?;
            }
            parts.push(TemplatePart::Variable(name.as_str().to_string()));
            last = whole.end();
        }
        if last < text.len() {
            push_literal(&mut parts, &text[last..])?;
        }
        Ok(Self { parts })
    }

    /// Whether the segment contains no placeholders.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.parts
            .iter()
            .all(|part| matches!(part, TemplatePart::Literal(_)))
    }

    /// Names of the variables referenced by this segment, in order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Variable(name) => Some(name.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }

    /// Substitute every placeholder.
    ///
    /// # Errors
    ///
    /// [`ResourceGroupError::MissingVariable`] when a placeholder is unbound,
    /// [`ResourceGroupError::InvalidIdentifier`] when the result is empty or
    /// contains `.`.
    pub fn instantiate(&self, bindings: &HashMap<String, String>) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Variable(name) => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| ResourceGroupError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        if out.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(format!(
                "segment `{self}` expanded to an empty name"
            )));
        }
        if out.contains(SEPARATOR) {
            return Err(ResourceGroupError::InvalidIdentifier(format!(
                "segment `{self}` expanded to `{out}` which contains `{SEPARATOR}`"
            )));
        }
        Ok(out)
    }
}

fn push_literal(parts: &mut Vec<TemplatePart>, text: &str) -> Result<()> {
    if text.contains("${") {
        return Err(ResourceGroupError::InvalidIdentifier(format!(
            "malformed placeholder in `{text}`"
        )));
    }
    parts.push(TemplatePart::Literal(text.to_string()));
    Ok(())
}

impl fmt::Display for SegmentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => f.write_str(text)?,
                TemplatePart::Variable(name) => write!(f, "${{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// Identifier pattern with per-query placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceGroupIdTemplate {
    segments: Vec<SegmentTemplate>,
}

impl ResourceGroupIdTemplate {
    /// Parse the textual form, e.g. `global.${USER}`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] on an empty template
    /// or a malformed segment.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(
                "template is empty".into(),
            ));
        }
        let segments = text
            .split(SEPARATOR)
            .map(SegmentTemplate::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Build a template from already parsed segments.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidIdentifier`] when `segments` is empty.
    pub fn from_segments(segments: Vec<SegmentTemplate>) -> Result<Self> {
        if segments.is_empty() {
            return Err(ResourceGroupError::InvalidIdentifier(
                "template has no segments".into(),
            ));
        }
        Ok(Self { segments })
    }

    /// Segment templates, root first.
    #[must_use]
    pub fn segments(&self) -> &[SegmentTemplate] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Template made of the first `len` segments.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.clamp(1, self.segments.len())].to_vec(),
        }
    }

    /// Variables referenced anywhere in the template, in order of appearance.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .flat_map(SegmentTemplate::variables)
            .collect()
    }

    /// Produce a concrete identifier.
    ///
    /// # Errors
    ///
    /// [`ResourceGroupError::MissingVariable`] for an unbound placeholder,
    /// [`ResourceGroupError::InvalidIdentifier`] for an empty or dotted
    /// substituted segment.
    pub fn instantiate(&self, bindings: &HashMap<String, String>) -> Result<ResourceGroupId> {
        let segments = self
            .segments
            .iter()
            .map(|segment| segment.instantiate(bindings))
            .collect::<Result<Vec<_>>>()?;
        ResourceGroupId::from_segments(segments)
    }
}

impl fmt::Display for ResourceGroupIdTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
