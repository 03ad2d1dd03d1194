//! The plugin module contains the `Stepper` trait every network plugin implements, the
//! configuration fields all plugins share, and the `Registry` that maps a plugin type to its
//! constructor.

pub mod cilium;

use crate::config::{Cni, CriType, ExtraMetadata, Networking};
use crate::error::{self, Result};
use crate::render::{RenderOptions, Rendered};
use crate::step::{Step, StepContext, StepNode};
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// This trait must be implemented by each network plugin.  Building steps is pure: the same
/// plugin state and nodes give the same steps, apart from their fresh identifiers.
pub trait Stepper: fmt::Debug + Send + Sync {
    /// Stable identifier of the plugin type, unique within a registry
    fn plugin_type(&self) -> &'static str;

    /// A fresh, uninitialized instance of the same plugin type
    fn create(&self) -> Box<dyn Stepper>;

    /// A new instance initialized from the cluster configuration.  The inputs are left as they
    /// are.
    fn init_step(
        &self,
        metadata: &ExtraMetadata,
        cni: &Cni,
        networking: &Networking,
    ) -> Box<dyn Stepper>;

    /// Steps that load the plugin's images on `nodes`, if the cluster needs them preloaded
    fn load_image(&self, nodes: &[StepNode]) -> Result<Vec<Step>>;

    /// Steps that install or upgrade the plugin on `nodes`
    fn install_steps(&self, nodes: &[StepNode], kubernetes_version: &str) -> Result<Vec<Step>>;

    /// Steps that remove the plugin from `nodes`
    fn uninstall_steps(&self, nodes: &[StepNode]) -> Result<Vec<Step>>;

    /// Render the plugin's configuration file, writing it unless `options.dry_run` is set
    fn render(&self, options: &RenderOptions) -> Result<Rendered>;

    /// Ready-to-run commands for inspecting the plugin in `namespace`, by short name
    fn cmd_list(&self, namespace: &str) -> BTreeMap<String, String>;

    /// The plugin's state, as carried by the steps it builds
    fn context(&self) -> StepContext;
}

/// Configuration fields shared by all network plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BaseCni {
    #[serde(rename = "type")]
    pub cni_type: String,
    pub version: String,
    pub offline: bool,
    pub local_registry: String,
    pub namespace: String,
    pub cri_type: CriType,
    pub arch: String,
}

impl BaseCni {
    /// Copy the shared fields out of the cluster configuration, falling back to
    /// `default_namespace` when none is given
    pub fn new(
        cni_type: &str,
        metadata: &ExtraMetadata,
        cni: &Cni,
        default_namespace: &str,
    ) -> Self {
        let namespace = if cni.namespace.is_empty() {
            default_namespace.to_string()
        } else {
            cni.namespace.clone()
        };

        Self {
            cni_type: cni_type.to_string(),
            version: cni.version.clone(),
            offline: cni.offline,
            local_registry: cni.local_registry.clone(),
            namespace,
            cri_type: metadata.cri,
            arch: metadata.arch.clone(),
        }
    }

    /// Images have to be preloaded when the cluster is offline and there is no local registry to
    /// pull them from
    pub fn needs_image_preload(&self) -> bool {
        self.offline && self.local_registry.is_empty()
    }
}

/// Builds an uninitialized plugin
pub type Constructor = fn() -> Box<dyn Stepper>;

/// Maps plugin types to their constructors.  Populated explicitly at startup.
#[derive(Debug, Default)]
pub struct Registry {
    constructors: HashMap<&'static str, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every plugin this crate ships
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(cilium::CiliumPlugin::boxed)?;
        Ok(registry)
    }

    /// Add a plugin under the type its instances report
    pub fn register(&mut self, constructor: Constructor) -> Result<()> {
        let plugin_type = constructor().plugin_type();
        ensure!(
            !self.constructors.contains_key(plugin_type),
            error::DuplicatePluginSnafu { plugin_type }
        );

        debug!("Registering network plugin '{}'", plugin_type);
        self.constructors.insert(plugin_type, constructor);
        Ok(())
    }

    /// A fresh, uninitialized instance of the given plugin type
    pub fn create(&self, plugin_type: &str) -> Result<Box<dyn Stepper>> {
        let constructor = self
            .constructors
            .get(plugin_type)
            .context(error::UnknownPluginSnafu { plugin_type })?;
        Ok(constructor())
    }

    /// Registered plugin types, sorted
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.constructors.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Rebuild an initialized plugin from the state carried by one of its steps
    pub fn from_context(&self, context: &StepContext) -> Result<Box<dyn Stepper>> {
        let plugin: Box<dyn Stepper> = match context {
            StepContext::Cilium(plugin) => Box::new(plugin.clone()),
            other => {
                return error::NotAPluginSnafu { kind: other.kind() }.fail();
            }
        };

        let plugin_type = plugin.plugin_type();
        ensure!(
            self.constructors.contains_key(plugin_type),
            error::UnknownPluginSnafu { plugin_type }
        );
        Ok(plugin)
    }
}
