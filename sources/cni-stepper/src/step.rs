//! Steps are the unit of work handed to the execution engine.  A step names the nodes it runs on,
//! the commands to run there in order, and the policy the engine applies when they fail: how long
//! to wait, how many times to retry, and whether a failure stops the rest of the sequence.
//!
//! Steps only declare that policy; nothing here runs or enforces it.

use crate::chart::Chart;
use crate::plugin::cilium::CiliumPlugin;
use crate::plugin::BaseCni;
use crate::{de, se};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// What the engine is doing when it runs a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Install,
    Uninstall,
    LoadImage,
    #[default]
    Generic,
}

serde_plain::derive_display_from_serialize!(Action);

/// One target machine for a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepNode {
    pub id: String,
    pub ipv4: String,
    #[serde(default)]
    pub hostname: String,
}

impl StepNode {
    pub fn new<S1, S2>(id: S1, ipv4: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let id = id.into();
        Self {
            hostname: id.clone(),
            id,
            ipv4: ipv4.into(),
        }
    }
}

/// Typed state carried by template and custom commands, so the agent can rebuild what produced
/// the step without going back to the cluster configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepContext {
    Cilium(CiliumPlugin),
    Chart(Chart),
}

impl StepContext {
    /// The `kind` tag this context serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            StepContext::Cilium(_) => "cilium",
            StepContext::Chart(_) => "chart",
        }
    }

    /// The shared plugin configuration, for contexts describing a plugin
    pub fn base(&self) -> Option<&BaseCni> {
        match self {
            StepContext::Cilium(plugin) => Some(&plugin.base),
            StepContext::Chart(_) => None,
        }
    }
}

/// A single executable unit of a step
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Run `args[0]` with the remaining arguments, in exactly this order
    Shell { args: Vec<String> },
    /// Render a file on the node using the component registered under `identity`
    Template { identity: String, data: StepContext },
    /// Run the agent step registered under `identity`
    Custom { identity: String, data: StepContext },
}

impl Command {
    pub fn shell<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Shell {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The argument vector, for shell commands
    pub fn shell_args(&self) -> Option<&[String]> {
        match self {
            Command::Shell { args } => Some(args),
            _ => None,
        }
    }

    /// The carried state, for template and custom commands
    pub fn context(&self) -> Option<&StepContext> {
        match self {
            Command::Shell { .. } => None,
            Command::Template { data, .. } | Command::Custom { data, .. } => Some(data),
        }
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            Command::Shell { .. } => None,
            Command::Template { identity, .. } | Command::Custom { identity, .. } => {
                Some(identity)
            }
        }
    }
}

/// A schedulable unit of work.  Built once through `StepBuilder` and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Step {
    id: String,
    name: String,
    #[serde(default)]
    action: Action,
    #[serde(
        serialize_with = "se::serialize_timeout",
        deserialize_with = "de::deserialize_timeout"
    )]
    timeout: Duration,
    err_ignore: bool,
    retry_times: u32,
    nodes: Vec<StepNode>,
    commands: Vec<Command>,
}

impl Step {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn err_ignore(&self) -> bool {
        self.err_ignore
    }

    pub fn retry_times(&self) -> u32 {
        self.retry_times
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

/// Collects the parts of a step; `build` stamps it with a fresh identifier.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: String,
    action: Action,
    timeout: Duration,
    err_ignore: bool,
    retry_times: u32,
    nodes: Vec<StepNode>,
    commands: Vec<Command>,
}

impl StepBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            action: Action::default(),
            timeout: DEFAULT_TIMEOUT,
            err_ignore: false,
            retry_times: 0,
            nodes: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn err_ignore(mut self, err_ignore: bool) -> Self {
        self.err_ignore = err_ignore;
        self
    }

    pub fn retry_times(mut self, retry_times: u32) -> Self {
        self.retry_times = retry_times;
        self
    }

    pub fn nodes(mut self, nodes: &[StepNode]) -> Self {
        self.nodes = nodes.to_vec();
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn build(self) -> Step {
        let step = Step {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            action: self.action,
            timeout: self.timeout,
            err_ignore: self.err_ignore,
            retry_times: self.retry_times,
            nodes: self.nodes,
            commands: self.commands,
        };
        trace!("Built step '{}' ({})", step.name, step.id);
        step
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn nodes() -> Vec<StepNode> {
        vec![StepNode::new("b", "10.0.0.2"), StepNode::new("a", "10.0.0.1")]
    }

    #[test]
    fn fresh_ids() {
        let builder = StepBuilder::new("noop").command(Command::shell(["true"]));
        let ids: HashSet<String> = (0..50)
            .map(|_| builder.clone().build().id().to_string())
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn node_order_kept() {
        let step = StepBuilder::new("noop").nodes(&nodes()).build();
        let ids: Vec<&str> = step.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn engine_json() {
        let step = StepBuilder::new("uninstallSomething")
            .action(Action::Uninstall)
            .timeout(Duration::from_secs(120))
            .err_ignore(true)
            .retry_times(1)
            .nodes(&[StepNode::new("a", "10.0.0.1")])
            .command(Command::shell(["helm", "uninstall", "x"]))
            .build();

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["timeout"], json!(120));
        assert_eq!(value["action"], json!("uninstall"));
        assert_eq!(value["err-ignore"], json!(true));
        assert_eq!(value["retry-times"], json!(1));
        assert_eq!(
            value["commands"],
            json!([{"type": "shell", "args": ["helm", "uninstall", "x"]}])
        );
        assert_eq!(
            value["nodes"],
            json!([{"id": "a", "ipv4": "10.0.0.1", "hostname": "a"}])
        );

        let parsed: Step = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, step);
    }

    #[test]
    fn action_names() {
        assert_eq!(Action::LoadImage.to_string(), "load-image");
        assert_eq!(Action::default(), Action::Generic);
    }

    #[test]
    fn shell_accessors() {
        let command = Command::shell(["kubectl", "get", "po"]);
        assert_eq!(
            command.shell_args().unwrap(),
            &["kubectl".to_string(), "get".to_string(), "po".to_string()]
        );
        assert!(command.context().is_none());
        assert!(command.identity().is_none());
    }
}
