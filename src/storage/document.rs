use serde::{Deserialize, Serialize};

use crate::{
    analysis::TopEvent,
    domain::{
        CauseDeclaration, FailureMode, Interface, ModelError, Module, SystemSnapshot, TaskProfile,
    },
};

/// A model as written by hand or exported by an authoring tool.
///
/// Besides the structure, failure modes and cause declarations, a document
/// may carry the top events of interest and a default task profile, so a
/// single file is enough to run an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDocument {
    /// System components.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Connections between components.
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    /// Failure modes of the interfaces.
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
    /// Declared causal links.
    #[serde(default)]
    pub causes: Vec<CauseDeclaration>,
    /// Failure conditions to analyse when none are given on the command line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_events: Vec<TopEvent>,
    /// Task profile to use when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<TaskProfile>,
}

impl ModelDocument {
    /// Validates the model part of the document.
    ///
    /// # Errors
    ///
    /// See [`SystemSnapshot::new`].
    pub fn into_snapshot(self) -> Result<SystemSnapshot, ModelError> {
        SystemSnapshot::new(
            self.modules,
            self.interfaces,
            self.failure_modes,
            self.causes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_events_and_profile_are_optional() {
        let document: ModelDocument = serde_yaml::from_str(
            r"
modules: []
top_events: ['module:ecu', 'interface:sig/lost']
profile:
  name: flight
  phases:
    - { name: cruise, duration: 2.0 }
",
        )
        .unwrap();

        assert_eq!(document.top_events.len(), 2);
        assert_eq!(document.top_events[1].condition.as_deref(), Some("lost"));
        assert_eq!(document.profile.unwrap().total_duration(), 2.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ModelDocument, _> = serde_yaml::from_str("modules: []\ngates: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn empty_document_is_an_empty_model() {
        let snapshot = ModelDocument::default().into_snapshot().unwrap();
        assert!(snapshot.failure_modes().is_empty());
    }
}
