/*!
# Background

cni-stepper turns a declarative CNI configuration into the ordered, retry-annotated steps an
external execution engine runs on cluster nodes to load images, install, and remove a network
plugin.

Each network plugin implements the [`Stepper`] trait.  An orchestrator asks a [`Registry`] for an
instance by plugin type, initializes it from the cluster configuration with
[`Stepper::init_step`], and then asks it for steps:

* [`Stepper::load_image`] loads the plugin's images on nodes in offline mode
* [`Stepper::install_steps`] fetches the chart, renders the values file, and runs `helm upgrade`
* [`Stepper::uninstall_steps`] removes images and runs `helm uninstall`

Building steps never touches the filesystem.  The only operation with side effects is
[`Stepper::render`], which writes the plugin's helm values file, or only previews it in dry-run
mode.

Steps that need the plugin's state on the node (image loading, rendering) carry it as a typed
[`StepContext`] so the agent side can rebuild the plugin with [`Registry::from_context`].
*/

#[macro_use]
extern crate log;

pub mod chart;
pub mod config;
mod de;
pub mod error;
pub mod image;
pub mod plugin;
pub mod render;
mod se;
pub mod step;
pub mod template;

pub use error::{Error, Result};
pub use plugin::cilium::CiliumPlugin;
pub use plugin::{Registry, Stepper};
pub use render::{RenderOptions, Rendered};
pub use step::{Action, Command, Step, StepBuilder, StepContext, StepNode};
