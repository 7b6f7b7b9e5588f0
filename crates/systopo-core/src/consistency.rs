//! Diagnostic walk over a subtree that collects every structural violation

use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::arena::{ComponentKey, DataPathKey};
use crate::datapath::PathOrientation;
use crate::topology::{Topology, TopologyError};

/// One violation found by [`Topology::check_consistency`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("{child} is listed under {parent} but its parent is {recorded:?}")]
    ParentMismatch {
        parent: ComponentKey,
        child: ComponentKey,
        recorded: Option<ComponentKey>,
    },
    #[error("{parent} lists child {child}, which no longer exists")]
    MissingChild {
        parent: ComponentKey,
        child: ComponentKey,
    },
    #[error("{child} appears {count} times among the children of {parent}")]
    DuplicateChildEntry {
        parent: ComponentKey,
        child: ComponentKey,
        count: usize,
    },
    #[error("children of {parent} share id {id}: {components:?}")]
    DuplicateSiblingId {
        parent: ComponentKey,
        id: i32,
        components: Vec<ComponentKey>,
    },
    #[error("{component} references {path}, which no longer exists")]
    DanglingDataPath {
        component: ComponentKey,
        path: DataPathKey,
    },
    #[error("{component} has {path} registered but is not one of its endpoints")]
    ForeignDataPath {
        component: ComponentKey,
        path: DataPathKey,
    },
    #[error("endpoint {component} of {path} is missing its {expected} registration")]
    MissingRegistration {
        component: ComponentKey,
        path: DataPathKey,
        expected: &'static str,
    },
}

/// Outcome of a consistency check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Components visited
    pub checked: usize,
    pub violations: Vec<Inconsistency>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

impl Topology {
    /// Walk the subtree under `key` and report every violation found
    ///
    /// Checks that each child points back at the node listing it, appears
    /// once, and has an id unique among its siblings, and that every path
    /// registration is live and matches the path's orientation. Violations
    /// never abort the walk.
    pub fn check_consistency(&self, key: ComponentKey) -> Result<ConsistencyReport, TopologyError> {
        let mut report = ConsistencyReport::default();
        let subtree = self.get_components_in_subtree(key)?;

        for component in subtree {
            report.checked += 1;
            let comp = self.component(component)?;

            let mut occurrences: HashMap<ComponentKey, usize> = HashMap::new();
            let mut ids: HashMap<i32, Vec<ComponentKey>> = HashMap::new();
            for child in comp.children() {
                *occurrences.entry(*child).or_default() += 1;
                match self.components.get(*child) {
                    None => report.violations.push(Inconsistency::MissingChild {
                        parent: component,
                        child: *child,
                    }),
                    Some(c) => {
                        if c.parent != Some(component) {
                            report.violations.push(Inconsistency::ParentMismatch {
                                parent: component,
                                child: *child,
                                recorded: c.parent,
                            });
                        }
                        let siblings = ids.entry(c.id()).or_default();
                        if !siblings.contains(child) {
                            siblings.push(*child);
                        }
                    }
                }
            }
            for child in comp.children() {
                if let Some(count) = occurrences.remove(child) {
                    if count > 1 {
                        report.violations.push(Inconsistency::DuplicateChildEntry {
                            parent: component,
                            child: *child,
                            count,
                        });
                    }
                }
            }
            let mut duplicate_ids: Vec<_> = ids.into_iter().filter(|(_, keys)| keys.len() > 1).collect();
            duplicate_ids.sort_by_key(|(id, _)| *id);
            for (id, components) in duplicate_ids {
                report.violations.push(Inconsistency::DuplicateSiblingId {
                    parent: component,
                    id,
                    components,
                });
            }

            self.check_path_registrations(component, &mut report);
        }

        for violation in &report.violations {
            warn!(violation = %violation, "Topology inconsistency");
        }
        Ok(report)
    }

    fn check_path_registrations(&self, component: ComponentKey, report: &mut ConsistencyReport) {
        let Some(comp) = self.components.get(component) else {
            return;
        };
        for path in comp.outgoing.iter().chain(comp.incoming.iter()) {
            let Some(dp) = self.paths.get(*path) else {
                report.violations.push(Inconsistency::DanglingDataPath {
                    component,
                    path: *path,
                });
                continue;
            };
            if dp.source() != component && dp.target() != component {
                report.violations.push(Inconsistency::ForeignDataPath {
                    component,
                    path: *path,
                });
            }
        }

        // Every path this component is an endpoint of must be registered as its orientation demands
        for (path, dp) in self.paths.iter() {
            let mut expected = Vec::new();
            match dp.orientation() {
                PathOrientation::Oriented => {
                    if dp.source() == component {
                        expected.push(("outgoing", comp.outgoing.contains(&path)));
                    }
                    if dp.target() == component {
                        expected.push(("incoming", comp.incoming.contains(&path)));
                    }
                }
                PathOrientation::Bidirectional => {
                    if dp.source() == component || dp.target() == component {
                        expected.push(("outgoing", comp.outgoing.contains(&path)));
                        expected.push(("incoming", comp.incoming.contains(&path)));
                    }
                }
            }
            for (direction, present) in expected {
                if !present {
                    report.violations.push(Inconsistency::MissingRegistration {
                        component,
                        path,
                        expected: direction,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::datapath::{DataPath, DataPathType};

    #[test]
    fn test_clean_tree_is_consistent() {
        let mut topo = Topology::new();
        let root = topo.root();
        let node = topo.add_component(Some(root), Component::node(0)).unwrap();
        let a = topo.add_component(Some(node), Component::core(0)).unwrap();
        let b = topo.add_component(Some(node), Component::core(1)).unwrap();
        topo.create_data_path(DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::None))
            .unwrap();

        let report = topo.check_consistency(root).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.checked, 4);

        // Every non-root component appears exactly once under its parent
        for key in topo.get_components_in_subtree(root).unwrap().into_iter().skip(1) {
            let parent = topo.parent(key).unwrap().unwrap();
            let count = topo.children(parent).unwrap().iter().filter(|c| **c == key).count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_duplicate_sibling_ids_reported() {
        let mut topo = Topology::new();
        let root = topo.root();
        let node = topo.add_component(Some(root), Component::node(0)).unwrap();
        let a = topo.add_component(Some(node), Component::core(3)).unwrap();
        let b = topo.add_component(Some(node), Component::core(3)).unwrap();
        // Same id in different parents is fine
        topo.add_component(Some(a), Component::thread(3)).unwrap();

        let report = topo.check_consistency(root).unwrap();
        assert_eq!(
            report.violations,
            vec![Inconsistency::DuplicateSiblingId {
                parent: node,
                id: 3,
                components: vec![a, b],
            }]
        );
    }

    #[test]
    fn test_all_violations_collected() {
        let mut topo = Topology::new();
        let root = topo.root();
        let node = topo.add_component(Some(root), Component::node(0)).unwrap();
        let a = topo.add_component(Some(node), Component::core(0)).unwrap();
        let b = topo.add_component(Some(node), Component::core(1)).unwrap();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::None))
            .unwrap();

        // Corrupt the tree behind the public API's back
        topo.components.get_mut(a).unwrap().parent = None;
        topo.components.get_mut(node).unwrap().children.push(b);
        topo.components.get_mut(b).unwrap().incoming.clear();
        let gone = topo
            .create_data_path(DataPath::new(a, a, PathOrientation::Oriented, DataPathType::None))
            .unwrap();
        topo.paths.remove(gone);

        let report = topo.check_consistency(root).unwrap();
        assert!(report.violations.contains(&Inconsistency::ParentMismatch {
            parent: node,
            child: a,
            recorded: None,
        }));
        assert!(report.violations.contains(&Inconsistency::DuplicateChildEntry {
            parent: node,
            child: b,
            count: 2,
        }));
        assert!(report.violations.contains(&Inconsistency::MissingRegistration {
            component: b,
            path: dp,
            expected: "incoming",
        }));
        assert!(report.violations.contains(&Inconsistency::DanglingDataPath {
            component: a,
            path: gone,
        }));
    }
}
