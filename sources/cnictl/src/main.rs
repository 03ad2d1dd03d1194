/*!
cnictl builds the steps that install, upgrade or remove a cluster's network plugin, and prints
them as JSON for the execution engine.  It reads a toml configuration file with the following
shape:

`kubernetes-version`: the cluster's kubernetes version
`metadata`: cluster-wide context, e.g. the container runtime (`cri`) and node architecture (`arch`)
`cni`: the network plugin's `type`, `version`, `offline` mode, `local-registry` and `namespace`,
with plugin settings in a nested table named after the plugin, e.g. `[cni.cilium]`
`networking`: the cluster's service and pod networks
`nodes`: the nodes the steps target, each with an `id` and `ipv4`

The `expand` subcommand is the node side of a step: it renders the files a step's template
commands describe and prints the shell commands its commands expand to.
*/

#[macro_use]
extern crate log;

use argh::FromArgs;
use cni_stepper::config::CniConfig;
use cni_stepper::{Command, Registry, RenderOptions, Rendered, Step, StepContext, Stepper};
use serde::Serialize;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::{OptionExt, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Stores arguments
#[derive(FromArgs, PartialEq, Debug)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option)]
    log_level: Option<LevelFilter>,
    /// configuration file describing the cluster's network plugin and nodes
    #[argh(option, default = "constants::CONFIG_FILE.to_string()", short = 'c')]
    config: String,
    #[argh(subcommand)]
    subcommand: Subcommand,
}

/// Stores the subcommand to be executed
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand)]
enum Subcommand {
    Types(TypesArgs),
    LoadImage(LoadImageArgs),
    InstallSteps(InstallStepsArgs),
    UninstallSteps(UninstallStepsArgs),
    Render(RenderArgs),
    Commands(CommandsArgs),
    Expand(ExpandArgs),
}

/// Lists the network plugin types this tool knows
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "types")]
struct TypesArgs {}

/// Prints the steps that load the plugin's images
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "load-image")]
struct LoadImageArgs {}

/// Prints the steps that install or upgrade the plugin
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "install-steps")]
struct InstallStepsArgs {
    /// kubernetes version of the cluster, overriding the configuration file
    #[argh(option)]
    kubernetes_version: Option<String>,
}

/// Prints the steps that remove the plugin
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "uninstall-steps")]
struct UninstallStepsArgs {}

/// Renders the plugin's values file
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "render")]
struct RenderArgs {
    /// print the values file instead of writing it
    #[argh(switch)]
    dry_run: bool,
    /// directory the values file is written to
    #[argh(option, default = "constants::MANIFEST_DIR.to_string()")]
    manifest_dir: String,
}

/// Prints the commands for inspecting the running plugin
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "commands")]
struct CommandsArgs {
    /// namespace the plugin runs in, defaults to the plugin's own
    #[argh(option)]
    namespace: Option<String>,
}

/// Expands a step into the shell commands a node runs for it
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "expand")]
struct ExpandArgs {
    /// JSON file holding one step
    #[argh(option)]
    step_file: String,
    /// render files a step describes without writing them
    #[argh(switch)]
    dry_run: bool,
}

// Builds the plugin named by the configuration, initialized from it
fn load_plugin<P>(registry: &Registry, path: P) -> Result<(CniConfig, Box<dyn Stepper>)>
where
    P: AsRef<Path>,
{
    let config = CniConfig::from_path(path).context(error::ConfigSnafu)?;
    let plugin = registry
        .create(&config.cni.cni_type)
        .context(error::PluginSnafu)?
        .init_step(&config.metadata, &config.cni, &config.networking);
    info!(
        "Using network plugin '{}' for {} node(s)",
        plugin.plugin_type(),
        config.nodes.len()
    );

    Ok((config, plugin))
}

/// What a step expands to on a node
#[derive(Debug, Default)]
struct Expansion {
    /// Shell commands to run, in order
    commands: Vec<Command>,
    /// Files rendered for the step's template commands
    rendered: Vec<Rendered>,
}

// Renders what the step's template commands describe, and collects the shell commands the step
// expands to.  Files always go to the manifest directory the install commands read from.
fn expand_step(registry: &Registry, step: &Step, dry_run: bool) -> Result<Expansion> {
    let options = RenderOptions {
        dry_run,
        ..Default::default()
    };
    let mut expansion = Expansion::default();
    for command in step.commands() {
        match command {
            Command::Shell { .. } => expansion.commands.push(command.clone()),
            Command::Template { data, .. } => {
                let plugin = registry.from_context(data).context(error::PluginSnafu)?;
                let rendered = plugin.render(&options).context(error::RenderSnafu)?;
                if !rendered.written {
                    println!("{}", rendered.content);
                }
                expansion.rendered.push(rendered);
            }
            Command::Custom { identity, data } => match data {
                StepContext::Cilium(plugin) => expansion.commands.extend(
                    plugin
                        .image_commands(step.action())
                        .context(error::PluginSnafu)?,
                ),
                // Charts are fetched by the downloader itself
                StepContext::Chart(chart) => {
                    info!(
                        "Step '{}' is run by '{}': chart {} {}",
                        step.name(),
                        identity,
                        chart.pkg_name,
                        chart.version
                    );
                }
            },
        }
    }

    Ok(expansion)
}

fn print_json<T>(value: &T) -> Result<()>
where
    T: Serialize,
{
    let output = serde_json::to_string_pretty(value).context(error::SerializeSnafu)?;
    println!("{}", output);
    Ok(())
}

fn setup_logger(args: &Args) -> Result<()> {
    let log_level = args.log_level.unwrap_or(LevelFilter::Info);
    SimpleLogger::init(log_level, LogConfig::default()).context(error::LoggerSnafu)
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();
    setup_logger(&args)?;
    let registry = Registry::with_defaults().context(error::PluginSnafu)?;

    match args.subcommand {
        Subcommand::Types(_) => print_json(&registry.types()),
        Subcommand::LoadImage(_) => {
            let (config, plugin) = load_plugin(&registry, &args.config)?;
            let steps = plugin
                .load_image(&config.nodes)
                .context(error::StepsSnafu)?;
            print_json(&steps)
        }
        Subcommand::InstallSteps(install_args) => {
            let (config, plugin) = load_plugin(&registry, &args.config)?;
            let kubernetes_version = install_args
                .kubernetes_version
                .unwrap_or(config.kubernetes_version);
            let steps = plugin
                .install_steps(&config.nodes, &kubernetes_version)
                .context(error::StepsSnafu)?;
            print_json(&steps)
        }
        Subcommand::UninstallSteps(_) => {
            let (config, plugin) = load_plugin(&registry, &args.config)?;
            let steps = plugin
                .uninstall_steps(&config.nodes)
                .context(error::StepsSnafu)?;
            print_json(&steps)
        }
        Subcommand::Render(render_args) => {
            let (_, plugin) = load_plugin(&registry, &args.config)?;
            let options = RenderOptions {
                dry_run: render_args.dry_run,
                manifest_dir: PathBuf::from(render_args.manifest_dir),
            };
            let rendered = plugin.render(&options).context(error::RenderSnafu)?;
            if !rendered.written {
                print!("{}", rendered.content);
            }
            Ok(())
        }
        Subcommand::Commands(commands_args) => {
            let (_, plugin) = load_plugin(&registry, &args.config)?;
            let namespace = match commands_args.namespace {
                Some(namespace) => namespace,
                None => plugin
                    .context()
                    .base()
                    .map(|base| base.namespace.clone())
                    .context(error::NoNamespaceSnafu {
                        plugin_type: plugin.plugin_type(),
                    })?,
            };
            print_json(&plugin.cmd_list(&namespace))
        }
        Subcommand::Expand(expand_args) => {
            let path = PathBuf::from(expand_args.step_file);
            let step_str =
                fs::read_to_string(&path).context(error::StepReadSnafu { path: &path })?;
            let step: Step =
                serde_json::from_str(&step_str).context(error::StepParseSnafu { path: &path })?;
            let expansion = expand_step(&registry, &step, expand_args.dry_run)?;
            print_json(&expansion.commands)
        }
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

/// ＜コ：ミ くコ:彡 ＜コ：ミ くコ:彡 ＜コ：ミ くコ:彡 ＜コ：ミ くコ:彡 ＜コ：ミ くコ:彡 ＜コ：ミ くコ:彡
mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Failed to load configuration: {}", source))]
        Config { source: cni_stepper::Error },

        #[snafu(display("Failed to setup logger: {}", source))]
        Logger { source: log::SetLoggerError },

        #[snafu(display("Network plugin '{}' has no namespace to inspect", plugin_type))]
        NoNamespace { plugin_type: String },

        #[snafu(display("{}", source))]
        Plugin { source: cni_stepper::Error },

        #[snafu(display("Failed to render values: {}", source))]
        Render { source: cni_stepper::Error },

        #[snafu(display("Failed to serialize output: {}", source))]
        Serialize { source: serde_json::Error },

        #[snafu(display("Failed to parse step from '{}': {}", path.display(), source))]
        StepParse {
            path: PathBuf,
            source: serde_json::Error,
        },

        #[snafu(display("Failed to read step from '{}': {}", path.display(), source))]
        StepRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Failed to build steps: {}", source))]
        Steps { source: cni_stepper::Error },
    }
}

type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::*;
    use cni_stepper::config::{Cni, ExtraMetadata, Networking};
    use cni_stepper::{Action, StepNode};

    fn offline_plugin() -> Box<dyn Stepper> {
        let cni = Cni {
            cni_type: "cilium".to_string(),
            version: "1.14.5".to_string(),
            offline: true,
            ..Default::default()
        };
        Registry::with_defaults()
            .unwrap()
            .create("cilium")
            .unwrap()
            .init_step(&ExtraMetadata::default(), &cni, &Networking::default())
    }

    #[test]
    fn render_args() {
        let args = Args::from_args(&["cnictl"], &["render", "--dry-run"]).unwrap();
        assert_eq!(args.config, "/etc/cni-stepper/cni.toml");
        assert_eq!(
            args.subcommand,
            Subcommand::Render(RenderArgs {
                dry_run: true,
                manifest_dir: "/tmp/.cni".to_string(),
            })
        );
    }

    #[test]
    fn expand_args() {
        let args = Args::from_args(&["cnictl"], &["expand", "--step-file", "step.json"]).unwrap();
        assert_eq!(
            args.subcommand,
            Subcommand::Expand(ExpandArgs {
                step_file: "step.json".to_string(),
                dry_run: false,
            })
        );
        // Rendered files always land where the install command reads them
        assert!(Args::from_args(
            &["cnictl"],
            &["expand", "--step-file", "step.json", "--manifest-dir", "/srv"]
        )
        .is_err());
    }

    #[test]
    fn expand_image_loader() {
        let registry = Registry::with_defaults().unwrap();
        let nodes = vec![StepNode::new("node-a", "10.0.0.1")];
        let steps = offline_plugin().load_image(&nodes).unwrap();
        assert_eq!(steps[0].action(), Action::LoadImage);

        let expansion = expand_step(&registry, &steps[0], true).unwrap();
        assert_eq!(expansion.commands.len(), 1);
        assert_eq!(expansion.commands[0].shell_args().unwrap()[0], "ctr");
        assert!(expansion.rendered.is_empty());
    }

    #[test]
    fn expand_install() {
        let registry = Registry::with_defaults().unwrap();
        let nodes = vec![StepNode::new("node-a", "10.0.0.1")];
        let steps = offline_plugin().install_steps(&nodes, "v1.27.4").unwrap();

        // The chart step is left to the downloader
        let fetch = expand_step(&registry, &steps[0], true).unwrap();
        assert!(fetch.commands.is_empty());
        assert!(fetch.rendered.is_empty());

        // The render step produces the values file
        let render = expand_step(&registry, &steps[1], true).unwrap();
        assert!(render.commands.is_empty());
        assert_eq!(render.rendered.len(), 1);
        assert!(!render.rendered[0].written);

        // The apply step reads the values file from where it was rendered
        let apply = expand_step(&registry, &steps[2], true).unwrap();
        let args = apply.commands[0].shell_args().unwrap();
        assert_eq!(args[0], "helm");
        assert_eq!(args[8], "-f");
        assert_eq!(PathBuf::from(&args[9]), render.rendered[0].path);
    }
}
