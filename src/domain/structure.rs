//! System structure: modules joined by typed interfaces.
//!
//! The structure is pure data. Modules exclusively own their interface points;
//! interfaces only *refer* to modules and points by identifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{InterfaceId, ModelError, ModuleId, PointId};

/// A system component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique identifier.
    pub id: ModuleId,
    /// Human-readable name.
    pub name: String,
    /// Free-form type tag (e.g. "hardware", "software", "algorithm").
    #[serde(default)]
    pub kind: String,
    /// Interface points owned by this module.
    #[serde(default)]
    pub points: Vec<PointId>,
}

/// The closed classification of interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceCategory {
    /// Forces, torques, physical mounting.
    Mechanical,
    /// Power and electrical connections.
    Electrical,
    /// Data buses and signal lines.
    DataSignal,
    /// Heat transfer paths.
    Thermal,
    /// Material or fluid flow.
    MaterialFluid,
}

/// Whether an interface carries influence one way or both ways.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From the `from` endpoint to the `to` endpoint.
    #[default]
    Directed,
    /// Both ways.
    Bidirectional,
}

/// One end of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// The module at this end.
    pub module: ModuleId,
    /// The module's interface point used by the connection.
    pub point: PointId,
}

/// A connection between interface points on two modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Unique identifier.
    pub id: InterfaceId,
    /// Human-readable name.
    pub name: String,
    /// Interface category.
    pub category: InterfaceCategory,
    /// Direction of influence.
    #[serde(default)]
    pub direction: Direction,
    /// Source endpoint.
    pub from: Endpoint,
    /// Destination endpoint.
    pub to: Endpoint,
}

impl Interface {
    /// Returns `true` if either endpoint sits on the given module.
    #[must_use]
    pub fn touches(&self, module: &ModuleId) -> bool {
        &self.from.module == module || &self.to.module == module
    }
}

/// A validated structure graph.
///
/// Declaration order of modules and interfaces is preserved and is the order
/// used wherever the analysis needs a stable ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    modules: Vec<Module>,
    interfaces: Vec<Interface>,
    module_index: BTreeMap<ModuleId, usize>,
    interface_index: BTreeMap<InterfaceId, usize>,
}

impl Structure {
    /// Builds and validates a structure.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if identifiers repeat, a point is owned by two
    /// modules, or an interface endpoint names an unknown module or a point
    /// its module does not own.
    pub fn new(modules: Vec<Module>, interfaces: Vec<Interface>) -> Result<Self, ModelError> {
        let mut module_index = BTreeMap::new();
        let mut point_owner: BTreeMap<&PointId, &ModuleId> = BTreeMap::new();

        for (position, module) in modules.iter().enumerate() {
            if module_index.insert(module.id.clone(), position).is_some() {
                return Err(ModelError::DuplicateIdentifier {
                    kind: "module",
                    id: module.id.to_string(),
                });
            }
            for point in &module.points {
                if let Some(first) = point_owner.insert(point, &module.id) {
                    return Err(ModelError::PointClaimed {
                        point: point.clone(),
                        first: first.clone(),
                        second: module.id.clone(),
                    });
                }
            }
        }

        let mut interface_index = BTreeMap::new();
        for (position, interface) in interfaces.iter().enumerate() {
            if interface_index
                .insert(interface.id.clone(), position)
                .is_some()
            {
                return Err(ModelError::DuplicateIdentifier {
                    kind: "interface",
                    id: interface.id.to_string(),
                });
            }
            for endpoint in [&interface.from, &interface.to] {
                if !module_index.contains_key(&endpoint.module) {
                    return Err(ModelError::ReferenceNotFound {
                        referrer: format!("interface `{}`", interface.id),
                        target: format!("module `{}`", endpoint.module),
                    });
                }
                if point_owner.get(&endpoint.point) != Some(&&endpoint.module) {
                    return Err(ModelError::PointNotOwned {
                        interface: interface.id.clone(),
                        module: endpoint.module.clone(),
                        point: endpoint.point.clone(),
                    });
                }
            }
        }

        Ok(Self {
            modules,
            interfaces,
            module_index,
            interface_index,
        })
    }

    /// Looks up a module.
    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.module_index.get(id).map(|&i| &self.modules[i])
    }

    /// Looks up an interface.
    #[must_use]
    pub fn interface(&self, id: &InterfaceId) -> Option<&Interface> {
        self.interface_index.get(id).map(|&i| &self.interfaces[i])
    }

    /// All modules, in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// All interfaces, in declaration order.
    #[must_use]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Interfaces with an endpoint on the given module, in declaration order.
    pub fn interfaces_of<'a>(
        &'a self,
        module: &'a ModuleId,
    ) -> impl Iterator<Item = &'a Interface> + 'a {
        self.interfaces.iter().filter(move |i| i.touches(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, points: &[&str]) -> Module {
        Module {
            id: ModuleId::new(id).unwrap(),
            name: id.to_uppercase(),
            kind: "hardware".to_string(),
            points: points.iter().map(|p| PointId::new(*p).unwrap()).collect(),
        }
    }

    fn interface(id: &str, from: (&str, &str), to: (&str, &str)) -> Interface {
        Interface {
            id: InterfaceId::new(id).unwrap(),
            name: id.to_string(),
            category: InterfaceCategory::Electrical,
            direction: Direction::Directed,
            from: Endpoint {
                module: ModuleId::new(from.0).unwrap(),
                point: PointId::new(from.1).unwrap(),
            },
            to: Endpoint {
                module: ModuleId::new(to.0).unwrap(),
                point: PointId::new(to.1).unwrap(),
            },
        }
    }

    #[test]
    fn valid_structure_indexes_entities() {
        let structure = Structure::new(
            vec![module("psu", &["psu.out"]), module("ecu", &["ecu.in"])],
            vec![interface("power", ("psu", "psu.out"), ("ecu", "ecu.in"))],
        )
        .unwrap();

        let ecu = ModuleId::new("ecu").unwrap();
        assert_eq!(structure.module(&ecu).unwrap().name, "ECU");
        assert_eq!(structure.interfaces_of(&ecu).count(), 1);
        assert!(
            structure
                .interface(&InterfaceId::new("power").unwrap())
                .is_some()
        );
    }

    #[test]
    fn duplicate_module_is_rejected() {
        let err = Structure::new(vec![module("a", &[]), module("a", &[])], vec![]).unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicateIdentifier {
                kind: "module",
                id: "a".to_string()
            }
        );
    }

    #[test]
    fn shared_point_is_rejected() {
        let err =
            Structure::new(vec![module("a", &["p"]), module("b", &["p"])], vec![]).unwrap_err();
        assert!(matches!(err, ModelError::PointClaimed { .. }));
    }

    #[test]
    fn endpoint_on_unknown_module_is_rejected() {
        let err = Structure::new(
            vec![module("a", &["a.1"])],
            vec![interface("x", ("a", "a.1"), ("ghost", "g.1"))],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ReferenceNotFound { .. }));
    }

    #[test]
    fn endpoint_on_foreign_point_is_rejected() {
        let err = Structure::new(
            vec![module("a", &["a.1"]), module("b", &["b.1"])],
            vec![interface("x", ("a", "b.1"), ("b", "b.1"))],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::PointNotOwned { .. }));
    }
}
