//! Attribute bundles attached to every metric point of a simulated process.
//!
//! The bundle is derived purely from a process's identity fields and its
//! heavy-hitter flag. It carries the identity tags plus a tier classification
//! computed from the executable name.

use serde::Serialize;
use std::fmt;

use crate::process::ProcessIdentity;

/// Executable name prefixes that mark a main application runtime.
const APPLICATION_PREFIXES: &[&str] = &["java_app", "python_api", "node_gateway"];

/// Service tier classification derived from the executable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    Tier1CriticalCore,
    Tier2ApplicationMain,
    Tier2InfraSupport,
    Tier3SupportGeneric,
}

impl ServiceTier {
    /// Classifies an executable name. First matching rule wins.
    pub fn classify(exec_name: &str) -> Self {
        if exec_name.contains("critical") {
            ServiceTier::Tier1CriticalCore
        } else if APPLICATION_PREFIXES
            .iter()
            .any(|prefix| exec_name.starts_with(prefix))
        {
            ServiceTier::Tier2ApplicationMain
        } else if exec_name.contains("nginx") || exec_name.contains("postgres") {
            ServiceTier::Tier2InfraSupport
        } else {
            ServiceTier::Tier3SupportGeneric
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTier::Tier1CriticalCore => "tier1_critical_core",
            ServiceTier::Tier2ApplicationMain => "tier2_application_main",
            ServiceTier::Tier2InfraSupport => "tier2_infra_support",
            ServiceTier::Tier3SupportGeneric => "tier3_support_generic",
        }
    }
}

impl fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag set labelling every metric point emitted for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeBundle {
    pub executable_name: String,
    pub owner: String,
    pub pid: u32,
    /// Decimal rendering of `pid`, kept alongside so exporters can borrow it.
    #[serde(skip)]
    pub pid_label: String,
    pub command_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub tier: ServiceTier,
    /// Always set; the heavy-hitter tag and label are emitted only when true.
    pub heavy_hitter: bool,
}

impl AttributeBundle {
    /// Attributes as semantic-convention style key/value pairs, in a stable order.
    /// Optional attributes are omitted when absent.
    pub fn key_values(&self) -> Vec<(&'static str, String)> {
        let mut kv = vec![
            ("process.executable.name", self.executable_name.clone()),
            ("process.owner", self.owner.clone()),
            ("process.pid", self.pid_label.clone()),
            ("process.command_line", self.command_line.clone()),
        ];
        if let Some(cid) = &self.container_id {
            kv.push(("container.id", cid.clone()));
        }
        kv.push(("custom.service.tier_simulated", self.tier.as_str().to_string()));
        if self.heavy_hitter {
            kv.push(("custom.process.is_heavy_hitter_simulated", "true".to_string()));
        }
        kv
    }
}

/// Computes the attribute bundle for a process identity.
///
/// Must be called again whenever any identity field or the heavy-hitter flag
/// changes; `ProcessState` does this for every mutation it exposes.
pub fn derive_attributes(identity: &ProcessIdentity, heavy_hitter: bool) -> AttributeBundle {
    AttributeBundle {
        executable_name: identity.exec_name.clone(),
        owner: identity.owner.clone(),
        pid: identity.pid,
        pid_label: identity.pid.to_string(),
        command_line: identity.command_line.clone(),
        container_id: identity
            .container_id
            .as_ref()
            .filter(|cid| !cid.is_empty())
            .cloned(),
        tier: ServiceTier::classify(&identity.exec_name),
        heavy_hitter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(exec_name: &str, container_id: Option<&str>) -> ProcessIdentity {
        ProcessIdentity {
            pid: 4242,
            exec_name: exec_name.to_string(),
            owner: "app_user".to_string(),
            command_line: format!("/opt/app/{exec_name}"),
            container_id: container_id.map(str::to_string),
        }
    }

    #[test]
    fn test_tier_priority_order() {
        assert_eq!(
            ServiceTier::classify("java_critical_payments"),
            ServiceTier::Tier1CriticalCore
        );
        // "critical" wins over the application prefix
        assert_eq!(
            ServiceTier::classify("java_app_critical"),
            ServiceTier::Tier1CriticalCore
        );
        assert_eq!(
            ServiceTier::classify("java_app_frontend"),
            ServiceTier::Tier2ApplicationMain
        );
        assert_eq!(
            ServiceTier::classify("python_api_worker"),
            ServiceTier::Tier2ApplicationMain
        );
        assert_eq!(
            ServiceTier::classify("node_gateway_restarted_v1.4"),
            ServiceTier::Tier2ApplicationMain
        );
        assert_eq!(
            ServiceTier::classify("nginx_ingress"),
            ServiceTier::Tier2InfraSupport
        );
        assert_eq!(
            ServiceTier::classify("postgres_primary"),
            ServiceTier::Tier2InfraSupport
        );
        assert_eq!(
            ServiceTier::classify("python_data_processor"),
            ServiceTier::Tier3SupportGeneric
        );
        assert_eq!(ServiceTier::classify("stress-ng"), ServiceTier::Tier3SupportGeneric);
    }

    #[test]
    fn test_bundle_optional_tags() {
        let plain = derive_attributes(&identity("custom_app_alpha", None), false);
        let keys: Vec<&str> = plain.key_values().iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"container.id"));
        assert!(!keys.contains(&"custom.process.is_heavy_hitter_simulated"));

        let full = derive_attributes(&identity("custom_app_alpha", Some("cid-0001-ab")), true);
        let kv = full.key_values();
        assert!(kv.contains(&("container.id", "cid-0001-ab".to_string())));
        assert!(kv.contains(&("custom.process.is_heavy_hitter_simulated", "true".to_string())));
        assert!(kv.contains(&("process.pid", "4242".to_string())));
    }

    #[test]
    fn test_empty_container_id_is_absent() {
        let bundle = derive_attributes(&identity("custom_app_beta", Some("")), false);
        assert_eq!(bundle.container_id, None);
    }
}
