//! Cilium, installed as a helm release.
//!
//! Install fetches the chart, renders the values file on the nodes and then upgrades or installs
//! the release from both.  In offline clusters without a local registry the images are loaded
//! from the archive shipped next to the chart before anything else, and removed again on
//! uninstall.

use super::{BaseCni, Stepper};
use crate::chart::{Chart, ChartSource};
use crate::config::{CiliumSettings, Cni, ExtraMetadata, Networking};
use crate::error::{self, Result};
use crate::image::ImageArchive;
use crate::render::{self, RenderOptions, Rendered};
use crate::step::{Action, Command, Step, StepBuilder, StepContext, StepNode};
use crate::template;
use maplit::btreemap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CILIUM_TYPE: &str = "cilium";
pub const CILIUM_NAMESPACE_DEFAULT: &str = "kube-system";

const RELEASE_NAME: &str = "cilium";
const VALUES_FILENAME: &str = "cilium.yaml";

const IMAGE_LOADER_STEP: &str = "cniImageLoader";
const IMAGE_REMOVER_STEP: &str = "cniImageRemover";
const RENDER_VALUES_STEP: &str = "renderCniValues";
const INSTALL_RELEASE_STEP: &str = "installCiliumRelease";
const UNINSTALL_RELEASE_STEP: &str = "uninstallCiliumRelease";

const IMAGE_TIMEOUT: Duration = Duration::from_secs(3 * 60);
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Identity of the components that expand this plugin's steps on the agent, e.g.
/// `cni-cilium-v1-step`.  The version segment names the `StepContext` schema they understand.
fn identity(kind: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        constants::CNI_INFO,
        CILIUM_TYPE,
        constants::COMPONENT_VERSION,
        kind
    )
}

/// The Cilium network plugin
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CiliumPlugin {
    pub base: BaseCni,
    /// Always serialized, as null when unset, so the values template can fall back on it
    pub cilium: Option<CiliumSettings>,
}

impl CiliumPlugin {
    /// An uninitialized plugin, in the shape the registry expects
    pub fn boxed() -> Box<dyn Stepper> {
        Box::new(Self::default())
    }

    /// Where the values file lands on the nodes
    pub fn values_path(manifest_dir: &Path) -> PathBuf {
        manifest_dir.join(VALUES_FILENAME)
    }

    fn chart(&self) -> Chart {
        Chart::new(CILIUM_TYPE, &self.base.version, self.base.offline)
    }

    fn image_archive(&self) -> ImageArchive {
        ImageArchive::new(CILIUM_TYPE, &self.base.version, &self.base.arch)
    }

    /// Like `install_steps`, with the chart coming from `source`
    pub fn install_steps_with(
        &self,
        source: &dyn ChartSource,
        nodes: &[StepNode],
        kubernetes_version: &str,
    ) -> Result<Vec<Step>> {
        debug!(
            "Building cilium {} install steps for {} node(s), kubernetes {}",
            self.base.version,
            nodes.len(),
            kubernetes_version
        );
        let mut steps = source.fetch_steps(nodes)?;

        steps.push(
            StepBuilder::new(RENDER_VALUES_STEP)
                .action(Action::Install)
                .timeout(RENDER_TIMEOUT)
                .retry_times(1)
                .nodes(nodes)
                .command(Command::Template {
                    identity: identity(constants::TYPE_TEMPLATE),
                    data: self.context(),
                })
                .build(),
        );

        let chart_path = source.chart_path().to_string_lossy().into_owned();
        let values_path = Self::values_path(Path::new(constants::MANIFEST_DIR))
            .to_string_lossy()
            .into_owned();
        steps.push(
            StepBuilder::new(INSTALL_RELEASE_STEP)
                .action(Action::Install)
                .timeout(INSTALL_TIMEOUT)
                .err_ignore(false)
                .retry_times(1)
                .nodes(nodes)
                .command(Command::shell([
                    constants::HELM_BIN,
                    "upgrade",
                    "--install",
                    "--create-namespace",
                    RELEASE_NAME,
                    "-n",
                    self.base.namespace.as_str(),
                    chart_path.as_str(),
                    "-f",
                    values_path.as_str(),
                ]))
                .build(),
        );

        Ok(steps)
    }

    /// The shell commands an agent runs for this plugin's image loader or remover step
    pub fn image_commands(&self, action: Action) -> Result<Vec<Command>> {
        let archive = self.image_archive();
        match action {
            Action::LoadImage => Ok(vec![archive.load_command(self.base.cri_type)]),
            Action::Uninstall => Ok(vec![archive.remove_command()]),
            _ => error::UnsupportedImageActionSnafu { action }.fail(),
        }
    }

    fn image_step(
        &self,
        name: &str,
        action: Action,
        err_ignore: bool,
        nodes: &[StepNode],
    ) -> Step {
        StepBuilder::new(name)
            .action(action)
            .timeout(IMAGE_TIMEOUT)
            .err_ignore(err_ignore)
            .retry_times(1)
            .nodes(nodes)
            .command(Command::Custom {
                identity: identity(constants::TYPE_STEP),
                data: self.context(),
            })
            .build()
    }
}

impl Stepper for CiliumPlugin {
    fn plugin_type(&self) -> &'static str {
        CILIUM_TYPE
    }

    fn create(&self) -> Box<dyn Stepper> {
        Self::boxed()
    }

    fn init_step(
        &self,
        metadata: &ExtraMetadata,
        cni: &Cni,
        _networking: &Networking,
    ) -> Box<dyn Stepper> {
        Box::new(Self {
            base: BaseCni::new(CILIUM_TYPE, metadata, cni, CILIUM_NAMESPACE_DEFAULT),
            cilium: cni.cilium.clone(),
        })
    }

    fn load_image(&self, nodes: &[StepNode]) -> Result<Vec<Step>> {
        if !self.base.needs_image_preload() {
            debug!("Images are pulled by the nodes, nothing to load");
            return Ok(Vec::new());
        }

        Ok(vec![self.image_step(
            IMAGE_LOADER_STEP,
            Action::LoadImage,
            false,
            nodes,
        )])
    }

    fn install_steps(&self, nodes: &[StepNode], kubernetes_version: &str) -> Result<Vec<Step>> {
        self.install_steps_with(&self.chart(), nodes, kubernetes_version)
    }

    fn uninstall_steps(&self, nodes: &[StepNode]) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        if self.base.needs_image_preload() {
            steps.push(self.image_step(IMAGE_REMOVER_STEP, Action::Uninstall, true, nodes));
        }

        steps.push(
            StepBuilder::new(UNINSTALL_RELEASE_STEP)
                .action(Action::Uninstall)
                .timeout(UNINSTALL_TIMEOUT)
                .err_ignore(true)
                .retry_times(1)
                .nodes(nodes)
                .command(Command::shell([
                    constants::HELM_BIN,
                    "uninstall",
                    RELEASE_NAME,
                    "-n",
                    self.base.namespace.as_str(),
                ]))
                .build(),
        );

        Ok(steps)
    }

    fn render(&self, options: &RenderOptions) -> Result<Rendered> {
        let registry = template::build_template_registry()?;
        let content = template::render(&registry, template::CILIUM_VALUES_NAME, self)?;

        let path = Self::values_path(&options.manifest_dir);
        let written = render::write_file(&path, content.as_bytes(), options.dry_run)?;
        if written {
            info!("Wrote cilium values to '{}'", path.display());
        }

        Ok(Rendered {
            path,
            content,
            written,
        })
    }

    fn cmd_list(&self, namespace: &str) -> BTreeMap<String, String> {
        btreemap! {
            "get".to_string() => format!(
                "{} get po -n {} | grep {}",
                constants::KUBECTL_BIN, namespace, RELEASE_NAME
            ),
            "restart".to_string() => format!(
                "{} rollout restart ds {} -n {}",
                constants::KUBECTL_BIN, RELEASE_NAME, namespace
            ),
        }
    }

    fn context(&self) -> StepContext {
        StepContext::Cilium(self.clone())
    }
}
