//! In offline mode a plugin's images are shipped as an archive next to its chart.  The agent
//! expands an image load or remove step into the container runtime commands built here.

use crate::config::CriType;
use crate::step::Command;
use std::path::{Path, PathBuf};

/// The image archive of one plugin version, as unpacked by the downloader on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArchive {
    pkg_name: String,
    version: String,
    arch: String,
}

impl ImageArchive {
    pub fn new<S1, S2, S3>(pkg_name: S1, version: S2, arch: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            pkg_name: pkg_name.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }

    pub fn dir(&self) -> PathBuf {
        Path::new(constants::DOWNLOAD_DIR)
            .join(format!(".{}", self.pkg_name))
            .join(&self.version)
            .join(&self.arch)
    }

    pub fn path(&self) -> PathBuf {
        self.dir().join(constants::IMAGE_FILENAME)
    }

    /// Import the archive into the node's container runtime
    pub fn load_command(&self, cri: CriType) -> Command {
        let path = self.path().to_string_lossy().into_owned();
        match cri {
            CriType::Containerd => Command::shell([
                constants::CTR_BIN,
                "-n",
                constants::CTR_NAMESPACE,
                "images",
                "import",
                path.as_str(),
            ]),
            CriType::Docker => Command::shell([constants::DOCKER_BIN, "load", "-i", path.as_str()]),
        }
    }

    /// Drop the unpacked archive from the node
    pub fn remove_command(&self) -> Command {
        let dir = self.dir().to_string_lossy().into_owned();
        Command::shell(["rm", "-rf", dir.as_str()])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn archive() -> ImageArchive {
        ImageArchive::new("cilium", "1.14.5", "amd64")
    }

    #[test]
    fn archive_layout() {
        assert_eq!(
            archive().path(),
            PathBuf::from("/tmp/kc-downloader/.cilium/1.14.5/amd64/images.tar.gz")
        );
    }

    #[test]
    fn containerd_import() {
        assert_eq!(
            archive().load_command(CriType::Containerd),
            Command::shell([
                "ctr",
                "-n",
                "k8s.io",
                "images",
                "import",
                "/tmp/kc-downloader/.cilium/1.14.5/amd64/images.tar.gz"
            ])
        );
    }

    #[test]
    fn docker_load() {
        assert_eq!(
            archive().load_command(CriType::Docker),
            Command::shell([
                "docker",
                "load",
                "-i",
                "/tmp/kc-downloader/.cilium/1.14.5/amd64/images.tar.gz"
            ])
        );
    }

    #[test]
    fn remove_unpacked() {
        assert_eq!(
            archive().remove_command(),
            Command::shell(["rm", "-rf", "/tmp/kc-downloader/.cilium/1.14.5/amd64"])
        );
    }
}
