//! # Action Registry
//!
//! The set of actions discovered from one schema fetch. The registry is built once,
//! all-or-nothing, and never changes afterwards.
use crate::{
    action::ActionDescriptor,
    schema::{SchemaDocument, flatten::DuplicateParameter},
};
use std::collections::{BTreeSet, HashMap};

/// Call name keywords used to group actions when listing them.
pub const KEYWORDS: [&str; 12] = [
    "DataCenter",
    "Firewall",
    "Image",
    "InternetAccess",
    "LoadBalancer",
    "Nic",
    "Notifications",
    "PublicIp",
    "RomDrive",
    "Server",
    "Snapshot",
    "Storage",
];

/// Group of actions whose name matches none of the [`KEYWORDS`].
pub const KEYWORDLESS: &str = "Keywordless";

/// Errors that make a schema unusable.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("Action '{action}' has an ambiguous parameter: {source}")]
    DuplicateParameter {
        action: String,
        source: DuplicateParameter,
    },
    #[error("Action '{0}' is declared more than once")]
    DuplicateAction(String),
}

/// All actions of the remote API, in schema order.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<ActionDescriptor>,
    index: HashMap<String, usize>,
    parameter_names: BTreeSet<String>,
}

impl ActionRegistry {
    pub fn from_schema(schema: SchemaDocument) -> Result<Self, SchemaError> {
        let mut registry = Self::default();

        for operation in schema.operations {
            let name = operation.name.clone();
            if registry.index.contains_key(&name) {
                return Err(SchemaError::DuplicateAction(name));
            }

            let action = ActionDescriptor::new(operation).map_err(|source| {
                SchemaError::DuplicateParameter {
                    action: name.clone(),
                    source,
                }
            })?;

            registry
                .parameter_names
                .extend(action.parameter_names().map(str::to_string));
            registry.index.insert(name, registry.actions.len());
            registry.actions.push(action);
        }

        tracing::debug!(
            actions = registry.actions.len(),
            parameters = registry.parameter_names.len(),
            "action registry built"
        );

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.index.get(name).map(|&i| &self.actions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(ActionDescriptor::name)
    }

    /// Every distinct flattened parameter name across all actions.
    pub fn parameter_names(&self) -> &BTreeSet<String> {
        &self.parameter_names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Groups action names by keyword, for listing.
    ///
    /// `selected` is `"all"` or one of [`KEYWORDS`] / [`KEYWORDLESS`]. An action appears
    /// under every keyword its name contains. Groups come in keyword order with sorted
    /// names; empty groups are left out.
    pub fn group_by_keyword(&self, selected: &str) -> Vec<(&'static str, Vec<&str>)> {
        let mut groups: Vec<(&'static str, Vec<&str>)> = KEYWORDS
            .iter()
            .chain(std::iter::once(&KEYWORDLESS))
            .map(|keyword| (*keyword, Vec::new()))
            .collect();

        for name in self.action_names() {
            let mut matched = false;
            for (keyword, names) in groups.iter_mut().take(KEYWORDS.len()) {
                if name.contains(*keyword) {
                    names.push(name);
                    matched = true;
                }
            }
            if !matched {
                groups[KEYWORDS.len()].1.push(name);
            }
        }

        groups
            .into_iter()
            .filter(|(keyword, names)| {
                !names.is_empty() && (selected == "all" || selected == *keyword)
            })
            .map(|(keyword, mut names)| {
                names.sort_unstable();
                (keyword, names)
            })
            .collect()
    }
}
