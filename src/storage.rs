//! Reading models, task profiles and trigger contexts from disk.
//!
//! Files are YAML (`.yaml`, `.yml`) or JSON (`.json`), chosen by extension.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::{
    analysis::TriggerContext,
    domain::{ModelError, SystemSnapshot, TaskProfile},
};

/// The on-disk model document.
pub mod document;
pub use document::ModelDocument;

/// Serialization format of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML.
    Yaml,
    /// JSON.
    Json,
}

impl Format {
    /// Picks the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Errors that can occur when loading a file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The extension is not one of the supported formats.
    #[error("unsupported file type: {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),
    /// The YAML could not be decoded.
    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        /// The file.
        path: PathBuf,
        /// The decoding error.
        #[source]
        source: serde_yaml::Error,
    },
    /// The JSON could not be decoded.
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        /// The file.
        path: PathBuf,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// The document decoded but is not a valid model.
    #[error("invalid model in {}: {source}", path.display())]
    Model {
        /// The file.
        path: PathBuf,
        /// The validation error.
        #[source]
        source: ModelError,
    },
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    match format {
        Format::Yaml => serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        Format::Json => serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads a model document without validating it.
///
/// # Errors
///
/// Returns a [`LoadError`] if the file cannot be read or decoded.
pub fn load_document(path: &Path) -> Result<ModelDocument, LoadError> {
    read(path)
}

/// Reads and validates a model document.
///
/// # Errors
///
/// Returns a [`LoadError`] if the file cannot be read or decoded, or
/// [`LoadError::Model`] if the model is invalid.
#[tracing::instrument]
pub fn load_snapshot(path: &Path) -> Result<SystemSnapshot, LoadError> {
    load_document(path)?
        .into_snapshot()
        .map_err(|source| LoadError::Model {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads a task profile.
///
/// # Errors
///
/// Returns a [`LoadError`] if the file cannot be read or decoded. An invalid
/// profile is reported as a decoding error.
pub fn load_profile(path: &Path) -> Result<TaskProfile, LoadError> {
    read(path)
}

/// Reads a trigger context.
///
/// # Errors
///
/// Returns a [`LoadError`] if the file cannot be read or is not an object.
pub fn load_context(path: &Path) -> Result<TriggerContext, LoadError> {
    read(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{Builder, TempDir};

    use super::*;

    const MODEL: &str = r"
modules:
  - id: sensor
    name: Wheel speed sensor
    points: [sensor.out]
  - id: ecu
    name: Brake ECU
    points: [ecu.in]
interfaces:
  - id: sig
    name: Speed signal
    category: data_signal
    from: { module: sensor, point: sensor.out }
    to: { module: ecu, point: ecu.in }
failure_modes:
  - id: sig_lost
    interface: sig
    label: signal lost
    occurrence: { model: probability, probability: 0.01 }
causes:
  - effect: { module: ecu }
    causes:
      - { interface: sig }
";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_yaml_model() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.yaml", MODEL);

        let snapshot = load_snapshot(&path).unwrap();

        assert_eq!(snapshot.structure().modules().len(), 2);
        assert_eq!(snapshot.failure_modes().len(), 1);
        assert_eq!(snapshot.causal().declarations().count(), 1);
    }

    #[test]
    fn json_and_yaml_load_the_same_model() {
        let dir = TempDir::new().unwrap();
        let yaml = write(&dir, "model.yml", MODEL);
        let document = load_document(&yaml).unwrap();
        let json = write(
            &dir,
            "model.json",
            &serde_json::to_string(&document).unwrap(),
        );

        assert_eq!(
            load_snapshot(&json).unwrap().fingerprint(),
            load_snapshot(&yaml).unwrap().fingerprint()
        );
    }

    #[test]
    fn invalid_model_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.yaml", &MODEL.replace("interface: sig", "interface: bus"));

        let err = load_snapshot(&path).unwrap_err();

        assert!(matches!(err, LoadError::Model { .. }));
        assert!(err.to_string().contains("model.yaml"));
    }

    #[test]
    fn missing_file_and_unknown_extension() {
        assert!(matches!(
            load_snapshot(Path::new("/nonexistent/model.yaml")),
            Err(LoadError::NotFound(_))
        ));

        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "modules: []").unwrap();
        assert!(matches!(
            load_snapshot(file.path()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn loads_profile_and_context() {
        let dir = TempDir::new().unwrap();
        let profile = write(
            &dir,
            "profile.yaml",
            r"
name: flight
time_unit: h
phases:
  - { name: takeoff, duration: 0.1 }
  - { name: cruise, duration: 2.0, inactive: [sig_lost] }
",
        );
        let context = write(
            &dir,
            "context.json",
            r#"{ "inputs": { "speed": 120 }, "events": ["overheat"] }"#,
        );

        let profile = load_profile(&profile).unwrap();
        assert_eq!(profile.phases().len(), 2);
        assert_eq!(profile.time_unit(), "h");

        let context = load_context(&context).unwrap();
        assert!(context.has_event("overheat"));
        assert_eq!(context.lookup("speed"), Some(&serde_json::json!(120)));
    }

    #[test]
    fn invalid_profile_is_a_decoding_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "profile.yaml", "name: empty\nphases: []\n");

        assert!(matches!(load_profile(&path), Err(LoadError::Yaml { .. })));
    }
}
