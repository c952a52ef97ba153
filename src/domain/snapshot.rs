//! Immutable model snapshots handed to the analysis engine.
//!
//! A [`SystemSnapshot`] bundles the structure, the failure-mode catalogue and
//! the causal declarations into one validated value. The engine only ever
//! reads snapshots; authoring tools build a fresh one per analysis call.

use std::collections::BTreeMap;

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use crate::domain::{
    CausalGraph, CauseDeclaration, EventRef, FailureMode, FailureModeId, Interface, InterfaceId,
    ModelError, Module, Structure, TaskProfile,
};

/// A validated, read-only view of the authored model.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    structure: Structure,
    failure_modes: Vec<FailureMode>,
    failure_mode_index: BTreeMap<FailureModeId, usize>,
    causal: CausalGraph,
}

impl SystemSnapshot {
    /// Validates and assembles a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the structure is invalid, a failure mode
    /// repeats an identifier, names an unknown interface or carries an invalid
    /// probability or rate, or a cause declaration is malformed or references
    /// an unknown entity.
    pub fn new(
        modules: Vec<Module>,
        interfaces: Vec<Interface>,
        failure_modes: Vec<FailureMode>,
        causes: Vec<CauseDeclaration>,
    ) -> Result<Self, ModelError> {
        let structure = Structure::new(modules, interfaces)?;

        let mut failure_mode_index = BTreeMap::new();
        for (position, failure_mode) in failure_modes.iter().enumerate() {
            if failure_mode_index
                .insert(failure_mode.id.clone(), position)
                .is_some()
            {
                return Err(ModelError::DuplicateIdentifier {
                    kind: "failure mode",
                    id: failure_mode.id.to_string(),
                });
            }
            if structure.interface(&failure_mode.interface).is_none() {
                return Err(ModelError::ReferenceNotFound {
                    referrer: format!("failure mode `{}`", failure_mode.id),
                    target: format!("interface `{}`", failure_mode.interface),
                });
            }
            failure_mode.validate()?;
        }

        let mut snapshot = Self {
            structure,
            failure_modes,
            failure_mode_index,
            causal: CausalGraph::default(),
        };

        for declaration in &causes {
            for event in std::iter::once(&declaration.effect).chain(&declaration.causes) {
                if !snapshot.contains(event) {
                    return Err(ModelError::ReferenceNotFound {
                        referrer: format!("cause declaration for {}", declaration.effect),
                        target: event.to_string(),
                    });
                }
            }
        }
        snapshot.causal = CausalGraph::new(causes)?;

        Ok(snapshot)
    }

    /// The structure graph.
    #[must_use]
    pub const fn structure(&self) -> &Structure {
        &self.structure
    }

    /// The declared causal links.
    #[must_use]
    pub const fn causal(&self) -> &CausalGraph {
        &self.causal
    }

    /// Looks up a failure mode.
    #[must_use]
    pub fn failure_mode(&self, id: &FailureModeId) -> Option<&FailureMode> {
        self.failure_mode_index
            .get(id)
            .map(|&i| &self.failure_modes[i])
    }

    /// All failure modes, in declaration order.
    #[must_use]
    pub fn failure_modes(&self) -> &[FailureMode] {
        &self.failure_modes
    }

    /// Failure modes attached to an interface, in declaration order.
    pub fn failure_modes_of<'a>(
        &'a self,
        interface: &'a InterfaceId,
    ) -> impl Iterator<Item = &'a FailureMode> + 'a {
        self.failure_modes
            .iter()
            .filter(move |fm| &fm.interface == interface)
    }

    /// Whether the referenced entity exists in this snapshot.
    #[must_use]
    pub fn contains(&self, event: &EventRef) -> bool {
        match event {
            EventRef::Module(id) => self.structure.module(id).is_some(),
            EventRef::Interface(id) => self.structure.interface(id).is_some(),
            EventRef::FailureMode(id) => self.failure_mode_index.contains_key(id),
        }
    }

    /// Checks that every failure mode named by a task profile exists.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ReferenceNotFound`] naming the phase and the
    /// unknown failure mode.
    pub fn validate_profile(&self, profile: &TaskProfile) -> Result<(), ModelError> {
        for phase in profile.phases().iter() {
            if let Some(unknown) = phase
                .referenced_failure_modes()
                .find(|id| !self.failure_mode_index.contains_key(*id))
            {
                return Err(ModelError::ReferenceNotFound {
                    referrer: format!("task profile phase `{}`", phase.name),
                    target: format!("failure mode `{unknown}`"),
                });
            }
        }
        Ok(())
    }

    /// A human-readable name for an event.
    #[must_use]
    pub fn describe(&self, event: &EventRef) -> String {
        match event {
            EventRef::Module(id) => self
                .structure
                .module(id)
                .map_or_else(|| id.to_string(), |m| format!("{} fails", m.name)),
            EventRef::Interface(id) => self
                .structure
                .interface(id)
                .map_or_else(|| id.to_string(), |i| format!("{} fails", i.name)),
            EventRef::FailureMode(id) => self.failure_mode(id).map_or_else(
                || id.to_string(),
                |fm| {
                    let interface = self
                        .structure
                        .interface(&fm.interface)
                        .map_or(fm.interface.as_str(), |i| i.name.as_str());
                    format!("{interface}: {}", fm.label)
                },
            ),
        }
    }

    /// Calculate the fingerprint of this snapshot.
    ///
    /// The fingerprint is a SHA256 hash of a Borsh-encoded canonical form of
    /// the model (entities in declaration order, declarations ordered by
    /// effect). Identical models always produce identical fingerprints.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            modules: Vec<(&'a str, &'a str, &'a str, Vec<&'a str>)>,
            interfaces: Vec<(&'a str, &'a str, String, [&'a str; 4])>,
            failure_modes: Vec<(&'a str, &'a str, &'a str, Option<&'a str>, String, bool)>,
            causes: Vec<(String, String, Vec<String>, bool)>,
        }

        let data = FingerprintData {
            modules: self
                .structure
                .modules()
                .iter()
                .map(|m| {
                    (
                        m.id.as_str(),
                        m.name.as_str(),
                        m.kind.as_str(),
                        m.points.iter().map(|p| p.as_str()).collect(),
                    )
                })
                .collect(),
            interfaces: self
                .structure
                .interfaces()
                .iter()
                .map(|i| {
                    (
                        i.id.as_str(),
                        i.name.as_str(),
                        format!("{:?}/{:?}", i.category, i.direction),
                        [
                            i.from.module.as_str(),
                            i.from.point.as_str(),
                            i.to.module.as_str(),
                            i.to.point.as_str(),
                        ],
                    )
                })
                .collect(),
            failure_modes: self
                .failure_modes
                .iter()
                .map(|fm| {
                    (
                        fm.id.as_str(),
                        fm.interface.as_str(),
                        fm.label.as_str(),
                        fm.trigger.as_ref().map(|t| t.as_str()),
                        // `{:?}` of f64 round-trips exactly.
                        format!("{:?}", fm.occurrence),
                        fm.enabled,
                    )
                })
                .collect(),
            causes: self
                .causal
                .declarations()
                .map(|d| {
                    (
                        d.effect.to_string(),
                        format!("{:?}", d.policy),
                        d.causes.iter().map(ToString::to_string).collect(),
                        d.intrinsic,
                    )
                })
                .collect(),
        };

        // encode using [borsh](https://borsh.io/)
        let encoded = borsh::to_vec(&data).expect("this should never fail");

        let hash = Sha256::digest(encoded);

        format!("{hash:x}")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small models shared by tests across the crate.

    use crate::domain::{
        CauseDeclaration, CombinationPolicy, Direction, Endpoint, EventRef, FailureMode,
        FailureModeId, Interface, InterfaceCategory, InterfaceId, Module, ModuleId, Occurrence,
        PointId, SystemSnapshot,
    };

    pub fn fm_ref(id: &str) -> EventRef {
        EventRef::FailureMode(FailureModeId::new(id).unwrap())
    }

    pub fn interface_ref(id: &str) -> EventRef {
        EventRef::Interface(InterfaceId::new(id).unwrap())
    }

    pub fn module_ref(id: &str) -> EventRef {
        EventRef::Module(ModuleId::new(id).unwrap())
    }

    pub fn declare(
        effect: EventRef,
        policy: CombinationPolicy,
        causes: Vec<EventRef>,
    ) -> CauseDeclaration {
        CauseDeclaration {
            effect,
            policy,
            causes,
            intrinsic: false,
        }
    }

    pub fn failure_mode(id: &str, interface: &str, probability: f64) -> FailureMode {
        FailureMode {
            id: FailureModeId::new(id).unwrap(),
            interface: InterfaceId::new(interface).unwrap(),
            label: format!("{id} failure"),
            trigger: None,
            occurrence: Occurrence::Probability { probability },
            enabled: true,
            severity: None,
        }
    }

    /// Three modules in a chain: `sensor -> ecu -> actuator`, each link an
    /// interface, plus a redundant power feed into the ECU.
    ///
    /// Interfaces: `sig` (sensor→ecu), `cmd` (ecu→actuator), `pwr_a`, `pwr_b`
    /// (psu_a/psu_b → ecu).
    pub fn modules_and_interfaces() -> (Vec<Module>, Vec<Interface>) {
        let module = |id: &str, points: &[&str]| Module {
            id: ModuleId::new(id).unwrap(),
            name: id.to_string(),
            kind: "hardware".to_string(),
            points: points.iter().map(|p| PointId::new(*p).unwrap()).collect(),
        };
        let interface = |id: &str, category, from: (&str, &str), to: (&str, &str)| Interface {
            id: InterfaceId::new(id).unwrap(),
            name: id.to_string(),
            category,
            direction: Direction::Directed,
            from: Endpoint {
                module: ModuleId::new(from.0).unwrap(),
                point: PointId::new(from.1).unwrap(),
            },
            to: Endpoint {
                module: ModuleId::new(to.0).unwrap(),
                point: PointId::new(to.1).unwrap(),
            },
        };

        (
            vec![
                module("sensor", &["sensor.out"]),
                module("ecu", &["ecu.in", "ecu.out", "ecu.pwr_a", "ecu.pwr_b"]),
                module("actuator", &["actuator.in"]),
                module("psu_a", &["psu_a.out"]),
                module("psu_b", &["psu_b.out"]),
            ],
            vec![
                interface(
                    "sig",
                    InterfaceCategory::DataSignal,
                    ("sensor", "sensor.out"),
                    ("ecu", "ecu.in"),
                ),
                interface(
                    "cmd",
                    InterfaceCategory::DataSignal,
                    ("ecu", "ecu.out"),
                    ("actuator", "actuator.in"),
                ),
                interface(
                    "pwr_a",
                    InterfaceCategory::Electrical,
                    ("psu_a", "psu_a.out"),
                    ("ecu", "ecu.pwr_a"),
                ),
                interface(
                    "pwr_b",
                    InterfaceCategory::Electrical,
                    ("psu_b", "psu_b.out"),
                    ("ecu", "ecu.pwr_b"),
                ),
            ],
        )
    }

    /// The chain model with one failure mode per interface and the command
    /// output explained by sensor loss or loss of both power feeds.
    pub fn snapshot() -> SystemSnapshot {
        let (modules, interfaces) = modules_and_interfaces();
        SystemSnapshot::new(
            modules,
            interfaces,
            vec![
                failure_mode("sig_lost", "sig", 0.01),
                failure_mode("cmd_lost", "cmd", 0.001),
                failure_mode("pwr_a_lost", "pwr_a", 0.02),
                failure_mode("pwr_b_lost", "pwr_b", 0.03),
            ],
            vec![
                CauseDeclaration {
                    effect: fm_ref("cmd_lost"),
                    policy: CombinationPolicy::Any,
                    causes: vec![interface_ref("sig"), module_ref("ecu")],
                    intrinsic: true,
                },
                declare(
                    module_ref("ecu"),
                    CombinationPolicy::All,
                    vec![interface_ref("pwr_a"), interface_ref("pwr_b")],
                ),
            ],
        )
        .unwrap()
    }
}
