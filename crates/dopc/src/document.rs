//! loading plan documents from disk
//!
//! The format is picked by file extension: `.json`, `.hcl` and anything else is read as YAML.
use crate::value::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Hcl,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => Format::Json,
            Some("hcl") => Format::Hcl,
            _ => Format::Yaml,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse yaml document")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Unable to parse json document")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("Unable to parse hcl document")]
    HclParseFailed(#[from] hcl::Error),
}

pub fn load_file(file_path: &Path) -> Result<Value, LoadError> {
    let file_path = file_path.canonicalize()?;
    tracing::info!(path=%file_path.display(), "loading file");

    let file_contents = std::fs::read_to_string(&file_path)?;
    load_str(&file_contents, Format::from_path(&file_path))
}

pub fn load_str(document: &str, format: Format) -> Result<Value, LoadError> {
    Ok(match format {
        Format::Yaml => serde_yaml::from_str::<serde_yaml::Value>(document)?.into(),
        Format::Json => serde_json::from_str::<serde_json::Value>(document)?.into(),
        Format::Hcl => hcl::from_str::<hcl::Value>(document)?.into(),
    })
}
