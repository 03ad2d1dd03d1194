use crate::step::Action;
use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Potential errors while building steps or rendering plugin configuration
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Network plugin '{}' is already registered", plugin_type))]
    DuplicatePlugin { plugin_type: String },

    #[snafu(display("Unknown network plugin '{}'", plugin_type))]
    UnknownPlugin { plugin_type: String },

    #[snafu(display("Step context of kind '{}' does not describe a network plugin", kind))]
    NotAPlugin { kind: String },

    #[snafu(display("No image commands exist for step action '{}'", action))]
    UnsupportedImageAction { action: Action },

    #[snafu(display("Failed to register template '{}': {}", template, source))]
    TemplateRegister {
        template: String,
        #[snafu(source(from(handlebars::TemplateError, Box::new)))]
        source: Box<handlebars::TemplateError>,
    },

    #[snafu(display("Failed to render template '{}': {}", template, source))]
    TemplateRender {
        template: String,
        #[snafu(source(from(handlebars::RenderError, Box::new)))]
        source: Box<handlebars::RenderError>,
    },

    #[snafu(display("Failed to create directory '{}': {}", dir.display(), source))]
    Mkdir { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to create tempfile in '{}': {}", dir.display(), source))]
    CreateTempfile { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to write '{}': {}", path.display(), source))]
    FileWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to set mode {:o} on '{}': {}", mode, path.display(), source))]
    FileMode {
        path: PathBuf,
        mode: u32,
        source: io::Error,
    },

    #[snafu(display("Failed to persist '{}': {}", path.display(), source))]
    PersistFile {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Destination '{}' has no parent directory", path.display()))]
    NoParentDir { path: PathBuf },

    #[snafu(display("Failed to read config file '{}': {}", path.display(), source))]
    ConfigRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse config file '{}': {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
