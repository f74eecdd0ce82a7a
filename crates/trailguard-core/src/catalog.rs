use crate::config::ClassificationConfig;
use crate::event::ChangeEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What the controller does with a classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NotifyOnly,
    NotifyAndRemediate,
}

impl Action {
    pub fn remediates(self) -> bool {
        matches!(self, Action::NotifyAndRemediate)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NotifyOnly => write!(f, "notify_only"),
            Action::NotifyAndRemediate => write!(f, "notify_and_remediate"),
        }
    }
}

/// Mapping of recognized event names to actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTable {
    actions: BTreeMap<String, Action>,
}

impl ActionTable {
    pub fn new(actions: BTreeMap<String, Action>) -> Self {
        Self { actions }
    }

    /// Action for an event name; unrecognized names map to `NotifyOnly`.
    pub fn action_for(&self, event_name: &str) -> Action {
        match self.actions.get(event_name) {
            Some(action) => *action,
            None => Action::NotifyOnly,
        }
    }

    pub fn is_recognized(&self, event_name: &str) -> bool {
        self.actions.contains_key(event_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Action)> {
        self.actions
            .iter()
            .map(|(name, action)| (name.as_str(), *action))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Builds the action table from config: the curated trail-management set
/// (when enabled) with configured entries layered on top.
pub fn resolve_action_table(config: &ClassificationConfig) -> ActionTable {
    let mut actions = BTreeMap::new();

    if config.curated {
        for (name, action) in curated_actions() {
            actions.insert(name.to_string(), action);
        }
    }

    for (name, action) in &config.actions {
        actions.insert(name.clone(), *action);
    }

    ActionTable::new(actions)
}

fn curated_actions() -> Vec<(&'static str, Action)> {
    vec![
        ("StopLogging", Action::NotifyAndRemediate),
        ("DeleteTrail", Action::NotifyOnly),
        ("UpdateTrail", Action::NotifyOnly),
        ("RemoveTags", Action::NotifyOnly),
        ("AddTags", Action::NotifyOnly),
        ("CreateTrail", Action::NotifyOnly),
        ("StartLogging", Action::NotifyOnly),
        ("PutEventSelectors", Action::NotifyOnly),
    ]
}

/// Pure classifier over an [`ActionTable`].
///
/// When event sources are configured, remediation is limited to events from
/// those sources; an event from any other source is still notified but never
/// remediated. With no sources configured the action depends on the event
/// name alone.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: ActionTable,
    event_sources: BTreeSet<String>,
}

impl Classifier {
    pub fn new(table: ActionTable, event_sources: impl IntoIterator<Item = String>) -> Self {
        Self {
            table,
            event_sources: event_sources.into_iter().collect(),
        }
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(
            resolve_action_table(config),
            config.event_sources.iter().cloned(),
        )
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }

    pub fn classify(&self, event: &ChangeEvent) -> Action {
        match self.table.action_for(event.event_name()) {
            Action::NotifyAndRemediate if !self.source_in_scope(event.event_source()) => {
                Action::NotifyOnly
            }
            action => action,
        }
    }

    fn source_in_scope(&self, source: &str) -> bool {
        self.event_sources.is_empty() || self.event_sources.contains(source)
    }
}
