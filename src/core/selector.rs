//! Selector matching: routes a [`QueryContext`] to a concrete group.
//!
//! Selectors are evaluated in declaration order and the first one whose
//! predicates all hold wins. Absent predicates are represented explicitly as
//! the `Any` case rather than as a missing value.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::Serialize;

use crate::core::context::QueryContext;
use crate::core::error::{ResourceGroupError, Result};
use crate::core::identifier::{ResourceGroupId, ResourceGroupIdTemplate};

/// Variable bound to the query's user.
pub const USER_VARIABLE: &str = "USER";
/// Variable bound to the query's source, when it has one.
pub const SOURCE_VARIABLE: &str = "SOURCE";

/// Predicate over a single text field.
#[derive(Debug, Clone)]
pub enum PatternPredicate {
    /// Matches every value, including an absent one.
    Any,
    /// Matches when the whole value matches the regular expression.
    Matches(Regex),
}

impl PatternPredicate {
    /// Compile a pattern anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidConfig`] if the pattern does not compile.
    pub fn compile(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(Self::Matches)
            .map_err(|e| ResourceGroupError::InvalidConfig(format!("bad pattern `{pattern}`: {e}")))
    }

    /// Test the predicate and collect named capture groups into `bindings`.
    fn matches(&self, value: Option<&str>, bindings: &mut HashMap<String, String>) -> bool {
        match self {
            Self::Any => true,
            Self::Matches(regex) => {
                let Some(value) = value else {
                    return false;
                };
                let Some(captures) = regex.captures(value) else {
                    return false;
                };
                for name in regex.capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        bindings.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                true
            }
        }
    }

    fn describe(&self) -> Option<String> {
        match self {
            Self::Any => None,
            Self::Matches(regex) => {
                let anchored = regex.as_str();
                Some(
                    anchored
                        .strip_prefix("^(?:")
                        .and_then(|s| s.strip_suffix(")$"))
                        .unwrap_or(anchored)
                        .to_string(),
                )
            }
        }
    }
}

/// Predicate over a set-valued selector field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPredicate {
    /// Matches every query.
    Any,
    /// Constrained to the given values.
    Constrained(BTreeSet<String>),
}

impl SetPredicate {
    fn from_values(values: Option<&[String]>) -> Self {
        values.map_or(Self::Any, |values| {
            Self::Constrained(values.iter().cloned().collect())
        })
    }

    fn values(&self) -> Option<Vec<String>> {
        match self {
            Self::Any => None,
            Self::Constrained(values) => Some(values.iter().cloned().collect()),
        }
    }
}

/// Ordered routing rule.
#[derive(Debug, Clone)]
pub struct Selector {
    user: PatternPredicate,
    source: PatternPredicate,
    query_types: SetPredicate,
    client_tags: SetPredicate,
    group: ResourceGroupIdTemplate,
}

impl Selector {
    /// Selector that routes every query to `group`.
    #[must_use]
    pub const fn new(group: ResourceGroupIdTemplate) -> Self {
        Self {
            user: PatternPredicate::Any,
            source: PatternPredicate::Any,
            query_types: SetPredicate::Any,
            client_tags: SetPredicate::Any,
            group,
        }
    }

    /// Constrain the user.
    #[must_use]
    pub fn with_user(mut self, user: PatternPredicate) -> Self {
        self.user = user;
        self
    }

    /// Constrain the source.
    #[must_use]
    pub fn with_source(mut self, source: PatternPredicate) -> Self {
        self.source = source;
        self
    }

    /// Constrain the query type to one of `types`.
    #[must_use]
    pub fn with_query_types(mut self, types: Option<&[String]>) -> Self {
        self.query_types = SetPredicate::from_values(types);
        self
    }

    /// Require every tag in `tags` on the query.
    #[must_use]
    pub fn with_client_tags(mut self, tags: Option<&[String]>) -> Self {
        self.client_tags = SetPredicate::from_values(tags);
        self
    }

    /// Target template.
    #[must_use]
    pub const fn group(&self) -> &ResourceGroupIdTemplate {
        &self.group
    }

    /// Evaluate the predicates; on a match return the variable bindings.
    #[must_use]
    pub fn match_context(&self, context: &QueryContext) -> Option<HashMap<String, String>> {
        let mut bindings = HashMap::new();
        if !self.user.matches(Some(&context.user), &mut bindings) {
            return None;
        }
        if !self.source.matches(context.source.as_deref(), &mut bindings) {
            return None;
        }
        if let SetPredicate::Constrained(types) = &self.query_types {
            match &context.query_type {
                Some(query_type) if types.contains(query_type) => {}
                _ => return None,
            }
        }
        if let SetPredicate::Constrained(tags) = &self.client_tags {
            if !tags.is_subset(&context.client_tags) {
                return None;
            }
        }

        bindings.insert(USER_VARIABLE.to_string(), context.user.clone());
        if let Some(source) = &context.source {
            bindings.insert(SOURCE_VARIABLE.to_string(), source.clone());
        }
        Some(bindings)
    }

    /// Read-only description used by the configuration summary.
    #[must_use]
    pub fn summary(&self) -> SelectorSummary {
        SelectorSummary {
            user: self.user.describe(),
            source: self.source.describe(),
            query_types: self.query_types.values(),
            client_tags: self.client_tags.values(),
            group: self.group.to_string(),
        }
    }
}

/// Serializable view of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSummary {
    /// User pattern, if constrained.
    pub user: Option<String>,
    /// Source pattern, if constrained.
    pub source: Option<String>,
    /// Accepted query types, if constrained.
    pub query_types: Option<Vec<String>>,
    /// Required client tags, if constrained.
    pub client_tags: Option<Vec<String>>,
    /// Target template text.
    pub group: String,
}

/// Outcome of routing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Concrete leaf group.
    pub group: ResourceGroupId,
    /// Template that produced it; also the key of its specification path.
    pub template: ResourceGroupIdTemplate,
    /// Position of the winning selector in declaration order.
    pub selector_index: usize,
}

/// Scan `selectors` in order and instantiate the first match.
///
/// # Errors
///
/// [`ResourceGroupError::NoMatchingSelector`] when nothing matches;
/// [`ResourceGroupError::MissingVariable`] or
/// [`ResourceGroupError::InvalidIdentifier`] when the winning template cannot
/// be instantiated. Later selectors are not consulted after a match.
pub fn resolve(selectors: &[Selector], context: &QueryContext) -> Result<Resolution> {
    for (selector_index, selector) in selectors.iter().enumerate() {
        let Some(bindings) = selector.match_context(context) else {
            continue;
        };
        let group = selector.group.instantiate(&bindings)?;
        tracing::debug!(
            "query {} matched selector {} -> {}",
            context.query_id,
            selector_index,
            group
        );
        return Ok(Resolution {
            group,
            template: selector.group.clone(),
            selector_index,
        });
    }
    Err(ResourceGroupError::NoMatchingSelector(
        context.query_id.to_string(),
    ))
}
