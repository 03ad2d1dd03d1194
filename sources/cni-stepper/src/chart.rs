//! Helm charts are fetched and cached on the nodes by the downloader, an agent component outside
//! this crate.  Plugins only need two things from it: the steps that get the chart onto the nodes,
//! and where the chart ends up once those steps ran.

use crate::error::Result;
use crate::step::{Action, Command, Step, StepBuilder, StepContext, StepNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Boundary to whatever gets a chart package onto the target nodes
pub trait ChartSource {
    /// Steps that fetch or unpack the chart, in the order they must run
    fn fetch_steps(&self, nodes: &[StepNode]) -> Result<Vec<Step>>;

    /// Where the chart package is on each node after `fetch_steps` ran
    fn chart_path(&self) -> PathBuf;
}

/// A chart package handled by the node downloader.  Online, the downloader pulls the package
/// from the chart repository; offline, it unpacks the bundle shipped with the cluster resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Chart {
    pub pkg_name: String,
    pub version: String,
    pub offline: bool,
}

impl Chart {
    pub fn new<S1, S2>(pkg_name: S1, version: S2, offline: bool) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            pkg_name: pkg_name.into(),
            version: version.into(),
            offline,
        }
    }

    /// The downloader's cache directory for this chart version
    pub fn dir(&self) -> PathBuf {
        Path::new(constants::DOWNLOAD_DIR)
            .join(format!(".{}", self.pkg_name))
            .join(&self.version)
    }
}

impl ChartSource for Chart {
    fn fetch_steps(&self, nodes: &[StepNode]) -> Result<Vec<Step>> {
        // An empty version is passed through; the downloader picks the chart's default
        debug!(
            "Fetching chart {} {} (offline: {})",
            self.pkg_name, self.version, self.offline
        );
        let step = StepBuilder::new(format!("loadChart-{}", self.pkg_name))
            .action(Action::Install)
            .timeout(Duration::from_secs(5 * 60))
            .retry_times(1)
            .nodes(nodes)
            .command(Command::Custom {
                identity: constants::DOWNLOADER_IDENTITY.to_string(),
                data: StepContext::Chart(self.clone()),
            })
            .build();

        Ok(vec![step])
    }

    fn chart_path(&self) -> PathBuf {
        self.dir().join(constants::CHART_FILENAME)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chart_path_layout() {
        let chart = Chart::new("cilium", "1.14.5", true);
        assert_eq!(
            chart.chart_path(),
            PathBuf::from("/tmp/kc-downloader/.cilium/1.14.5/charts.tgz")
        );
    }

    #[test]
    fn one_downloader_step() {
        let chart = Chart::new("cilium", "1.14.5", false);
        let nodes = vec![StepNode::new("a", "10.0.0.1")];
        let steps = chart.fetch_steps(&nodes).unwrap();

        assert_eq!(steps.len(), 1);
        let step = &steps[0];
        assert_eq!(step.name(), "loadChart-cilium");
        assert_eq!(step.nodes(), nodes.as_slice());
        assert_eq!(step.commands().len(), 1);
        assert_eq!(step.commands()[0].identity(), Some("downloader"));
        assert_eq!(
            step.commands()[0].context(),
            Some(&StepContext::Chart(chart.clone()))
        );
    }

    #[test]
    fn empty_version_fetched() {
        let chart = Chart::new("cilium", "", false);
        let steps = chart.fetch_steps(&[StepNode::new("a", "10.0.0.1")]).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(
            chart.chart_path(),
            PathBuf::from("/tmp/kc-downloader/.cilium/charts.tgz")
        );
    }
}
