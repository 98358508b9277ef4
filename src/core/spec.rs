//! Validated, immutable group specifications.
//!
//! A [`ManagerSpec`] is built once from a [`ResourceGroupsConfig`] and never
//! mutated afterwards; reconfiguration replaces the whole value.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{GroupConfig, ResourceGroupsConfig, SelectorConfig};
use crate::core::context::QueryContext;
use crate::core::error::{ResourceGroupError, Result};
use crate::core::identifier::{ResourceGroupIdTemplate, SegmentTemplate};
use crate::core::selector::{self, PatternPredicate, Resolution, Selector};

/// Rule for choosing the next queued entry among a group's descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingPolicy {
    /// Round robin among direct children.
    #[default]
    #[serde(alias = "fair")]
    Fair,
    /// Weighted round robin among direct children.
    #[serde(alias = "weighted")]
    Weighted,
    /// Highest priority first across the whole subtree.
    #[serde(alias = "query_priority")]
    QueryPriority,
    /// Path weight first, then FIFO, across the whole subtree.
    #[serde(alias = "weighted_fifo")]
    WeightedFifo,
}

impl SchedulingPolicy {
    /// Whether the policy compares entries across the whole subtree rather
    /// than only among direct children.
    #[must_use]
    pub const fn is_recursive(self) -> bool {
        matches!(self, Self::QueryPriority | Self::WeightedFifo)
    }

    /// Whether children of a group with this policy need a positive weight.
    #[must_use]
    pub const fn uses_weights(self) -> bool {
        matches!(self, Self::Weighted | Self::WeightedFifo)
    }
}

/// Effective limits and scheduling parameters of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    /// Target running count.
    pub soft_concurrency_limit: u32,
    /// Absolute ceiling on running entries.
    pub hard_concurrency_limit: u32,
    /// Maximum queued entries at this group.
    pub max_queued: usize,
    /// Policy applied among this group's descendants.
    pub scheduling_policy: SchedulingPolicy,
    /// Weight seen by a weighted parent.
    pub weight: u32,
}

/// Validated specification of one group and its children.
#[derive(Debug, Clone)]
pub struct ResourceGroupSpec {
    name: SegmentTemplate,
    settings: GroupSettings,
    sub_groups: Vec<ResourceGroupSpec>,
}

impl ResourceGroupSpec {
    /// Segment name template.
    #[must_use]
    pub const fn name(&self) -> &SegmentTemplate {
        &self.name
    }

    /// Effective settings.
    #[must_use]
    pub const fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    /// Children in declaration order.
    #[must_use]
    pub fn sub_groups(&self) -> &[Self] {
        &self.sub_groups
    }
}

#[derive(Debug, Clone, Copy)]
struct SpecEntry {
    settings: GroupSettings,
    is_leaf: bool,
}

/// Complete, validated configuration snapshot.
#[derive(Debug, Clone)]
pub struct ManagerSpec {
    version: u64,
    root_groups: Vec<ResourceGroupSpec>,
    selectors: Vec<Selector>,
    cpu_quota_period: Option<Duration>,
    by_template: HashMap<ResourceGroupIdTemplate, SpecEntry>,
}

impl ManagerSpec {
    /// Validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidConfig`] on duplicate sibling
    /// names, a hard limit below the soft limit, a missing or zero weight
    /// under a weighted parent, a policy that conflicts with a recursive
    /// ancestor, a bad name, pattern or duration, or a selector whose target
    /// is not a defined leaf group.
    pub fn from_config(config: &ResourceGroupsConfig) -> Result<Self> {
        let mut by_template = HashMap::new();
        let root_groups = build_siblings(&config.root_groups, None, &[], &mut by_template)?;

        let mut spec = Self {
            version: 0,
            root_groups,
            selectors: Vec::with_capacity(config.selectors.len()),
            cpu_quota_period: None,
            by_template,
        };

        for (index, selector) in config.selectors.iter().enumerate() {
            let selector = build_selector(selector)
                .map_err(|e| invalid(format!("selector {index}: {e}")))?;
            match spec.by_template.get(selector.group()) {
                None => {
                    return Err(invalid(format!(
                        "selector {index} targets `{}` which has no group specification",
                        selector.group()
                    )));
                }
                Some(entry) if !entry.is_leaf => {
                    return Err(invalid(format!(
                        "selector {index} targets `{}` which is not a leaf group",
                        selector.group()
                    )));
                }
                Some(_) => spec.selectors.push(selector),
            }
        }

        if let Some(period) = &config.cpu_quota_period {
            let parsed = humantime::parse_duration(period)
                .map_err(|e| invalid(format!("cpuQuotaPeriod `{period}`: {e}")))?;
            spec.cpu_quota_period = Some(parsed);
        }

        Ok(spec)
    }

    pub(crate) const fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Monotonic version assigned when the snapshot was installed.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Root specifications.
    #[must_use]
    pub fn root_groups(&self) -> &[ResourceGroupSpec] {
        &self.root_groups
    }

    /// Selectors in declaration order.
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Global quota period, if configured.
    #[must_use]
    pub const fn cpu_quota_period(&self) -> Option<Duration> {
        self.cpu_quota_period
    }

    /// Route a query through the selectors.
    ///
    /// # Errors
    ///
    /// See [`selector::resolve`].
    pub fn resolve(&self, context: &QueryContext) -> Result<Resolution> {
        selector::resolve(&self.selectors, context)
    }

    /// Settings of the group at `template`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::MissingResourceGroupSpec`] when no
    /// specification exists at that path.
    pub fn settings_for(&self, template: &ResourceGroupIdTemplate) -> Result<GroupSettings> {
        self.by_template
            .get(template)
            .map(|entry| entry.settings)
            .ok_or_else(|| ResourceGroupError::MissingResourceGroupSpec(template.to_string()))
    }

    /// Whether a specification exists at `template`.
    #[must_use]
    pub fn contains(&self, template: &ResourceGroupIdTemplate) -> bool {
        self.by_template.contains_key(template)
    }

    /// Every specification path with its settings, sorted by path text.
    #[must_use]
    pub fn specs_by_template(&self) -> Vec<(String, GroupSettings)> {
        let mut specs: Vec<(String, GroupSettings)> = self
            .by_template
            .iter()
            .map(|(template, entry)| (template.to_string(), entry.settings))
            .collect();
        specs.sort_by(|a, b| a.0.cmp(&b.0));
        specs
    }
}

fn invalid(message: impl Into<String>) -> ResourceGroupError {
    ResourceGroupError::InvalidConfig(message.into())
}

fn build_siblings(
    configs: &[GroupConfig],
    parent_policy: Option<SchedulingPolicy>,
    parent_path: &[SegmentTemplate],
    by_template: &mut HashMap<ResourceGroupIdTemplate, SpecEntry>,
) -> Result<Vec<ResourceGroupSpec>> {
    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(configs.len());
    for config in configs {
        let name = SegmentTemplate::parse(&config.name)
            .map_err(|e| invalid(format!("group `{}`: {e}", config.name)))?;
        if !seen.insert(name.clone()) {
            return Err(invalid(format!(
                "duplicate group name `{}` under `{}`",
                config.name,
                display_path(parent_path)
            )));
        }
        specs.push(build_group(config, name, parent_policy, parent_path, by_template)?);
    }
    Ok(specs)
}

fn build_group(
    config: &GroupConfig,
    name: SegmentTemplate,
    parent_policy: Option<SchedulingPolicy>,
    parent_path: &[SegmentTemplate],
    by_template: &mut HashMap<ResourceGroupIdTemplate, SpecEntry>,
) -> Result<ResourceGroupSpec> {
    let mut path = parent_path.to_vec();
    path.push(name.clone());
    let template = ResourceGroupIdTemplate::from_segments(path.clone())?;

    let hard = config.hard_concurrency_limit;
    let soft = config.soft_concurrency_limit.unwrap_or(hard);
    if hard < soft {
        return Err(invalid(format!(
            "group `{template}`: hardConcurrencyLimit {hard} is below softConcurrencyLimit {soft}"
        )));
    }

    let policy = match (parent_policy, config.scheduling_policy) {
        (Some(inherited), Some(own)) if inherited.is_recursive() && own != inherited => {
            return Err(invalid(format!(
                "group `{template}`: policy {own:?} conflicts with recursive {inherited:?} ancestor"
            )));
        }
        (Some(inherited), _) if inherited.is_recursive() => inherited,
        (_, own) => own.unwrap_or_default(),
    };

    let weight = match (parent_policy, config.weight) {
        (Some(parent), None | Some(0)) if parent.uses_weights() => {
            return Err(invalid(format!(
                "group `{template}`: a positive weight is required under a {parent:?} parent"
            )));
        }
        (_, weight) => weight.unwrap_or(1),
    };

    let settings = GroupSettings {
        soft_concurrency_limit: soft,
        hard_concurrency_limit: hard,
        max_queued: config.max_queued as usize,
        scheduling_policy: policy,
        weight,
    };

    let sub_groups = build_siblings(&config.sub_groups, Some(policy), &path, by_template)?;
    by_template.insert(
        template,
        SpecEntry {
            settings,
            is_leaf: sub_groups.is_empty(),
        },
    );

    Ok(ResourceGroupSpec {
        name,
        settings,
        sub_groups,
    })
}

fn build_selector(config: &SelectorConfig) -> Result<Selector> {
    let group = ResourceGroupIdTemplate::parse(&config.group)?;
    let mut selector = Selector::new(group)
        .with_query_types(config.query_type.as_deref())
        .with_client_tags(config.client_tags.as_deref());
    if let Some(user) = &config.user {
        selector = selector.with_user(PatternPredicate::compile(user)?);
    }
    if let Some(source) = &config.source {
        selector = selector.with_source(PatternPredicate::compile(source)?);
    }
    Ok(selector)
}

fn display_path(path: &[SegmentTemplate]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
