/*!
  This crate contains constants shared between the cni-stepper library and its command line tool
*/

// Where the downloader caches chart and image bundles on every node
pub const DOWNLOAD_DIR: &str = "/tmp/kc-downloader";
pub const CHART_FILENAME: &str = "charts.tgz";
pub const IMAGE_FILENAME: &str = "images.tar.gz";

// Where rendered values files are written before `helm upgrade` reads them
pub const MANIFEST_DIR: &str = "/tmp/.cni";

// Default configuration file for cnictl
pub const CONFIG_FILE: &str = "/etc/cni-stepper/cni.toml";

// Identities the execution engine uses to route template and custom commands
pub const CNI_INFO: &str = "cni";
pub const COMPONENT_VERSION: &str = "v1";
pub const TYPE_STEP: &str = "step";
pub const TYPE_TEMPLATE: &str = "template";
pub const DOWNLOADER_IDENTITY: &str = "downloader";

// Binaries run by shell commands on the nodes
pub const CTR_BIN: &str = "ctr";
pub const CTR_NAMESPACE: &str = "k8s.io";
pub const DOCKER_BIN: &str = "docker";
pub const HELM_BIN: &str = "helm";
pub const KUBECTL_BIN: &str = "kubectl";
