use serde::Deserialize;

use crate::sink::Severity;

/// Declarative flags controlling how a single descriptor is handled
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallationPolicy {
    /// Downgrade download/query failures to warnings
    pub continue_on_failed_download: bool,
    /// Discretionary group this descriptor belongs to
    pub optional_key: Option<String>,
    pub selected_by_default: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub extract: bool,
    pub delete_after_extract: bool,
    /// Force a reinstall whenever the target exists
    pub download_always: bool,
    /// Sibling file that gets disabled once this descriptor is installed
    pub supersede: Option<String>,
    /// Exact modpack version tag this descriptor belongs to
    pub modpack_version: Option<String>,
}

impl Default for InstallationPolicy {
    fn default() -> Self {
        Self {
            continue_on_failed_download: false,
            optional_key: None,
            selected_by_default: true,
            name: None,
            description: None,
            extract: false,
            delete_after_extract: false,
            download_always: false,
            supersede: None,
            modpack_version: None,
        }
    }
}

impl InstallationPolicy {
    /// Severity for query, transport and archive failures
    pub fn failure_severity(&self) -> Severity {
        if self.continue_on_failed_download {
            Severity::Warning
        } else {
            Severity::Severe
        }
    }

    pub fn force_redownload(&self) -> bool {
        self.download_always
    }
}
