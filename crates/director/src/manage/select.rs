//! Discretionary install choices and the final install/disable lists

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::InstallableMod;
use super::resolve::ResolutionBuckets;

/// One yes/no choice offered to the caller
#[derive(Debug)]
pub struct SelectableOption {
    key: String,
    name: String,
    description: Option<String>,
    selected: AtomicBool,
}

impl SelectableOption {
    fn new(key: String, name: String, description: Option<String>, selected: bool) -> Self {
        Self {
            key,
            name,
            description,
            selected: AtomicBool::new(selected),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    pub fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::SeqCst);
    }
}

/// Final outcome of the selection step
#[derive(Debug, Default)]
pub struct Selection {
    pub to_install: Vec<InstallableMod>,
    pub to_disable: Vec<InstallableMod>,
}

/// Merges resolution buckets with the caller's discretionary choices
#[derive(Debug)]
pub struct InstallSelector {
    candidates: Vec<InstallableMod>,
    fresh_count: usize,
    options: Vec<Arc<SelectableOption>>,
}

impl InstallSelector {
    /// Build options from every discretionary fresh or reinstall mod
    pub fn new(buckets: &ResolutionBuckets) -> Self {
        let mut candidates: Vec<InstallableMod> =
            buckets.fresh.iter().chain(buckets.reinstall.iter()).cloned().collect();
        candidates.sort_by_key(|m| m.index);

        let mut options: Vec<Arc<SelectableOption>> = Vec::new();
        for candidate in &candidates {
            let policy = candidate.policy();
            let Some(key) = policy.optional_key.as_deref() else {
                continue;
            };
            if options.iter().any(|o| o.key == key) {
                continue;
            }

            options.push(Arc::new(SelectableOption::new(
                key.to_string(),
                policy.name.clone().unwrap_or_else(|| key.to_string()),
                policy.description.clone(),
                policy.selected_by_default,
            )));
        }

        Self {
            candidates,
            fresh_count: buckets.fresh.len(),
            options,
        }
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    pub fn options(&self) -> &[Arc<SelectableOption>] {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&SelectableOption> {
        self.options.iter().find(|o| o.key == key).map(Arc::as_ref)
    }

    /// Toggle an option; false if no option has that key
    pub fn select(&self, key: &str, selected: bool) -> bool {
        match self.option(key) {
            Some(option) => {
                option.set_selected(selected);
                true
            }
            None => false,
        }
    }

    pub fn fresh_count(&self) -> usize {
        self.fresh_count
    }

    fn is_chosen(&self, installable: &InstallableMod) -> bool {
        match installable.policy().optional_key.as_deref() {
            None => true,
            Some(key) => self.option(key).is_some_and(SelectableOption::is_selected),
        }
    }

    pub fn mods_to_install(&self) -> Vec<InstallableMod> {
        self.candidates.iter().filter(|m| self.is_chosen(m)).cloned().collect()
    }

    /// Discretionary mods the caller turned down; they get a disabled marker
    pub fn mods_to_disable(&self) -> Vec<InstallableMod> {
        self.candidates.iter().filter(|m| !self.is_chosen(m)).cloned().collect()
    }

    pub fn compute(&self) -> Selection {
        let selection = Selection {
            to_install: self.mods_to_install(),
            to_disable: self.mods_to_disable(),
        };
        debug!(
            "Selected {} mods to install and {} to disable",
            selection.to_install.len(),
            selection.to_disable.len()
        );
        selection
    }
}

/// Driver that gets to toggle options before installation starts
#[async_trait]
pub trait SelectionHandler: Send + Sync {
    async fn select(&self, selector: &InstallSelector);
}

/// Accept every default
#[derive(Debug, Default)]
pub struct KeepDefaults;

#[async_trait]
impl SelectionHandler for KeepDefaults {
    async fn select(&self, _selector: &InstallSelector) {}
}

/// Fixed choices keyed by option key, e.g. from the command line
#[derive(Debug, Clone, Default)]
pub struct PresetSelection {
    choices: HashMap<String, bool>,
}

impl PresetSelection {
    pub fn new(choices: HashMap<String, bool>) -> Self {
        Self { choices }
    }
}

#[async_trait]
impl SelectionHandler for PresetSelection {
    async fn select(&self, selector: &InstallSelector) {
        for (key, selected) in &self.choices {
            if !selector.select(key, *selected) {
                warn!("No selectable option named {}", key);
            }
        }
    }
}
