//! The config module holds the declarative inputs a network plugin is initialized from: the
//! cluster-wide `ExtraMetadata`, the `Cni` block with its plugin-specific settings, and the
//! cluster `Networking`.  `CniConfig` ties them together with the target nodes, as read from a
//! `cni.toml` file.
//!
//! Plugin settings are kept exactly as given.  Missing values stay `None` here and are replaced
//! by defaults only when the values file is rendered.

use crate::error::{self, Result};
use crate::step::StepNode;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;

/// Container runtime running on the target nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CriType {
    #[default]
    Containerd,
    Docker,
}

serde_plain::derive_display_from_serialize!(CriType);
serde_plain::derive_fromstr_from_deserialize!(CriType);

const DEFAULT_ARCH: &str = "amd64";

/// Cluster-wide context handed to every plugin at initialization
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtraMetadata {
    pub cluster_name: String,
    pub cri: CriType,
    /// Architecture of the target nodes, selecting the image archive to load
    pub arch: String,
}

impl Default for ExtraMetadata {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            cri: CriType::default(),
            arch: DEFAULT_ARCH.to_string(),
        }
    }
}

/// The user-facing CNI block of the cluster configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Cni {
    #[serde(rename = "type")]
    pub cni_type: String,
    pub version: String,
    pub offline: bool,
    pub local_registry: String,
    pub namespace: String,
    pub cilium: Option<CiliumSettings>,
}

/// Cilium tuning knobs.  Every field is optional; see `template::CILIUM_VALUES` for the values
/// used when one is left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CiliumSettings {
    /// At least one operator replica; zero is rejected when the config is read
    pub operator_replicas: Option<NonZeroU32>,
    pub cluster_pool_ipv4_pod_cidr_list: Option<Vec<String>>,
    pub cluster_pool_ipv4_mask_size: Option<u8>,
    /// Passed through to cilium as given, since the accepted values differ between releases
    pub kube_proxy_replacement: Option<String>,
}

/// Cluster networking.  Passed to every plugin; cilium takes its pod pools from its own settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Networking {
    pub ip_family: String,
    pub services: Vec<String>,
    pub pods: Vec<String>,
    pub dns_domain: String,
    pub proxy_mode: String,
}

/// Everything needed to build steps for one request, as stored in `cni.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CniConfig {
    pub kubernetes_version: String,
    pub metadata: ExtraMetadata,
    pub cni: Cni,
    pub networking: Networking,
    pub nodes: Vec<StepNode>,
}

impl CniConfig {
    /// Read and parse a `cni.toml` file
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        debug!("Reading CNI config from '{}'", path.display());
        let config_str = fs::read_to_string(path).context(error::ConfigReadSnafu { path })?;
        let config: CniConfig =
            toml::from_str(&config_str).context(error::ConfigParseSnafu { path })?;
        trace!("Parsed CNI config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settings_stay_unset() {
        let config: CniConfig = toml::from_str(
            r#"
            [cni]
            type = "cilium"
            version = "1.14.5"

            [cni.cilium]
            operator-replicas = 3
            "#,
        )
        .unwrap();

        let cilium = config.cni.cilium.unwrap();
        assert_eq!(cilium.operator_replicas, NonZeroU32::new(3));
        assert_eq!(cilium.cluster_pool_ipv4_pod_cidr_list, None);
        assert_eq!(cilium.cluster_pool_ipv4_mask_size, None);
        assert_eq!(cilium.kube_proxy_replacement, None);
        assert!(config.cni.namespace.is_empty());
    }

    #[test]
    fn missing_settings_block() {
        let config: CniConfig = toml::from_str(
            r#"
            [cni]
            type = "cilium"
            "#,
        )
        .unwrap();
        assert!(config.cni.cilium.is_none());
        assert_eq!(config.metadata.cri, CriType::Containerd);
        assert_eq!(config.metadata.arch, "amd64");
    }

    #[test]
    fn kube_proxy_replacement_values() {
        for value in ["strict", "disabled", "true"] {
            let settings: CiliumSettings =
                toml::from_str(&format!(r#"kube-proxy-replacement = "{}""#, value)).unwrap();
            assert_eq!(settings.kube_proxy_replacement.as_deref(), Some(value));
        }
    }

    #[test]
    fn zero_operator_replicas() {
        assert!(toml::from_str::<CiliumSettings>("operator-replicas = 0").is_err());
        let settings: CiliumSettings = toml::from_str("operator-replicas = 1").unwrap();
        assert_eq!(settings.operator_replicas, NonZeroU32::new(1));
    }

    #[test]
    fn cri_from_str() {
        assert_eq!("docker".parse::<CriType>().unwrap(), CriType::Docker);
        assert_eq!(CriType::Containerd.to_string(), "containerd");
        assert!("podman".parse::<CriType>().is_err());
    }
}
