//! Data paths: performance-annotated edges between components
//!
//! Paths live in the topology's arena; components hold only the keys of
//! the paths registered on them. A directed path is outgoing on its source
//! and incoming on its target. A bidirectional path is both outgoing and
//! incoming on both endpoints.

use std::fmt;
use tracing::debug;

use crate::arena::{ComponentKey, DataPathKey};
use crate::attribute::{AttributeError, AttributeStore, AttributeValue, BuiltinValue, OpaqueValue};
use crate::topology::{Topology, TopologyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPathType {
    None,
    Logical,
    Physical,
    L3Cat,
    Mig,
    DataTransfer,
    C2C,
}

impl DataPathType {
    pub const ALL: [DataPathType; 7] = [
        DataPathType::None,
        DataPathType::Logical,
        DataPathType::Physical,
        DataPathType::L3Cat,
        DataPathType::Mig,
        DataPathType::DataTransfer,
        DataPathType::C2C,
    ];

    /// Numeric code used on the wire
    pub fn code(self) -> u32 {
        match self {
            Self::None => 32,
            Self::Logical => 64,
            Self::Physical => 128,
            Self::L3Cat => 256,
            Self::Mig => 512,
            Self::DataTransfer => 1024,
            Self::C2C => 2048,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Logical => "logical",
            Self::Physical => "physical",
            Self::L3Cat => "L3CAT",
            Self::Mig => "MIG",
            Self::DataTransfer => "datatransfer",
            Self::C2C => "C2C",
        }
    }
}

impl fmt::Display for DataPathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a path is directed or symmetric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrientation {
    Oriented,
    Bidirectional,
}

/// Which registration set of a component to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Union of both sets
    Any,
}

/// A directed or bidirectional edge between two components
#[derive(Debug)]
pub struct DataPath {
    source: ComponentKey,
    target: ComponentKey,
    orientation: PathOrientation,
    path_type: DataPathType,
    bandwidth: f64,
    latency: f64,
    attributes: AttributeStore,
}

impl DataPath {
    pub fn new(
        source: ComponentKey,
        target: ComponentKey,
        orientation: PathOrientation,
        path_type: DataPathType,
    ) -> Self {
        Self {
            source,
            target,
            orientation,
            path_type,
            bandwidth: 0.0,
            latency: 0.0,
            attributes: AttributeStore::new(),
        }
    }

    /// Builder-style bandwidth and latency
    pub fn with_metrics(mut self, bandwidth: f64, latency: f64) -> Self {
        self.bandwidth = bandwidth;
        self.latency = latency;
        self
    }

    pub fn source(&self) -> ComponentKey {
        self.source
    }

    pub fn target(&self) -> ComponentKey {
        self.target
    }

    pub fn orientation(&self) -> PathOrientation {
        self.orientation
    }

    pub fn is_oriented(&self) -> bool {
        self.orientation == PathOrientation::Oriented
    }

    pub fn path_type(&self) -> DataPathType {
        self.path_type
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn set_bandwidth(&mut self, bandwidth: f64) {
        self.bandwidth = bandwidth;
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn set_latency(&mut self, latency: f64) {
        self.latency = latency;
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    pub fn get_attribute(&self, key: &str) -> Result<&AttributeValue, AttributeError> {
        self.attributes.get(key)
    }

    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: OpaqueValue,
    ) -> Result<(), AttributeError> {
        self.attributes.set(key, value)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Result<AttributeValue, AttributeError> {
        self.attributes.remove(key)
    }

    pub fn set_builtin(&mut self, value: BuiltinValue) {
        self.attributes.set_builtin(value);
    }
}

fn push_unique(keys: &mut Vec<DataPathKey>, key: DataPathKey) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

impl Topology {
    /// Store a new path and register it on both endpoints
    pub fn create_data_path(&mut self, path: DataPath) -> Result<DataPathKey, TopologyError> {
        self.component(path.source)?;
        self.component(path.target)?;

        let (source, target) = (path.source, path.target);
        let key = self.paths.insert(path);
        self.register_path(key);
        debug!(path = %key, source = %source, target = %target, "Created data path");
        Ok(key)
    }

    pub fn data_path(&self, key: DataPathKey) -> Result<&DataPath, TopologyError> {
        self.paths.get(key).ok_or(TopologyError::StaleDataPath(key))
    }

    pub fn data_path_mut(&mut self, key: DataPathKey) -> Result<&mut DataPath, TopologyError> {
        self.paths.get_mut(key).ok_or(TopologyError::StaleDataPath(key))
    }

    /// All live paths in arena order
    pub fn data_paths(&self) -> impl Iterator<Item = (DataPathKey, &DataPath)> {
        self.paths.iter()
    }

    /// Register an existing path on one of its endpoints
    ///
    /// `Direction::Any` registers it in both sets.
    pub fn add_data_path(
        &mut self,
        component: ComponentKey,
        path: DataPathKey,
        direction: Direction,
    ) -> Result<(), TopologyError> {
        let dp = self.data_path(path)?;
        if dp.source != component && dp.target != component {
            return Err(TopologyError::NotAnEndpoint { component, path });
        }
        let comp = self.component_mut(component)?;
        match direction {
            Direction::Outgoing => push_unique(&mut comp.outgoing, path),
            Direction::Incoming => push_unique(&mut comp.incoming, path),
            Direction::Any => {
                push_unique(&mut comp.outgoing, path);
                push_unique(&mut comp.incoming, path);
            }
        }
        Ok(())
    }

    /// Paths registered on `component`, outgoing before incoming for `Any`
    pub fn get_data_paths(
        &self,
        component: ComponentKey,
        direction: Direction,
    ) -> Result<Vec<DataPathKey>, TopologyError> {
        let comp = self.component(component)?;
        let paths = match direction {
            Direction::Outgoing => comp.outgoing.clone(),
            Direction::Incoming => comp.incoming.clone(),
            Direction::Any => {
                let mut all = comp.outgoing.clone();
                for key in &comp.incoming {
                    push_unique(&mut all, *key);
                }
                all
            }
        };
        Ok(paths)
    }

    pub fn get_data_path_by_type(
        &self,
        component: ComponentKey,
        path_type: DataPathType,
        direction: Direction,
    ) -> Result<Option<DataPathKey>, TopologyError> {
        Ok(self
            .get_all_data_paths_by_type(component, path_type, direction)?
            .into_iter()
            .next())
    }

    pub fn get_all_data_paths_by_type(
        &self,
        component: ComponentKey,
        path_type: DataPathType,
        direction: Direction,
    ) -> Result<Vec<DataPathKey>, TopologyError> {
        Ok(self
            .get_data_paths(component, direction)?
            .into_iter()
            .filter(|key| {
                self.paths
                    .get(*key)
                    .map(|dp| dp.path_type == path_type)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Move the source end of a path to another component
    pub fn update_source(
        &mut self,
        path: DataPathKey,
        new_source: ComponentKey,
    ) -> Result<(), TopologyError> {
        self.data_path(path)?;
        self.component(new_source)?;

        self.deregister_path(path);
        if let Some(dp) = self.paths.get_mut(path) {
            dp.source = new_source;
        }
        self.register_path(path);
        debug!(path = %path, source = %new_source, "Updated data path source");
        Ok(())
    }

    /// Move the target end of a path to another component
    pub fn update_target(
        &mut self,
        path: DataPathKey,
        new_target: ComponentKey,
    ) -> Result<(), TopologyError> {
        self.data_path(path)?;
        self.component(new_target)?;

        self.deregister_path(path);
        if let Some(dp) = self.paths.get_mut(path) {
            dp.target = new_target;
        }
        self.register_path(path);
        debug!(path = %path, target = %new_target, "Updated data path target");
        Ok(())
    }

    /// Unregister a path from both endpoints and release it
    pub fn delete_data_path(&mut self, path: DataPathKey) -> Result<DataPath, TopologyError> {
        self.data_path(path)?;
        self.deregister_path(path);
        self.paths.remove(path).ok_or(TopologyError::StaleDataPath(path))
    }

    /// Delete every path touching `component`; returns how many were removed
    pub fn delete_all_data_paths(&mut self, component: ComponentKey) -> Result<usize, TopologyError> {
        let paths = self.get_data_paths(component, Direction::Any)?;
        let count = paths.len();
        for path in paths {
            self.delete_data_path(path)?;
        }
        Ok(count)
    }

    fn register_path(&mut self, key: DataPathKey) {
        let Some(dp) = self.paths.get(key) else {
            return;
        };
        let (source, target, orientation) = (dp.source, dp.target, dp.orientation);

        match orientation {
            PathOrientation::Oriented => {
                if let Some(comp) = self.components.get_mut(source) {
                    push_unique(&mut comp.outgoing, key);
                }
                if let Some(comp) = self.components.get_mut(target) {
                    push_unique(&mut comp.incoming, key);
                }
            }
            PathOrientation::Bidirectional => {
                for endpoint in [source, target] {
                    if let Some(comp) = self.components.get_mut(endpoint) {
                        push_unique(&mut comp.outgoing, key);
                        push_unique(&mut comp.incoming, key);
                    }
                }
            }
        }
    }

    fn deregister_path(&mut self, key: DataPathKey) {
        let Some(dp) = self.paths.get(key) else {
            return;
        };
        for endpoint in [dp.source, dp.target] {
            if let Some(comp) = self.components.get_mut(endpoint) {
                comp.outgoing.retain(|k| *k != key);
                comp.incoming.retain(|k| *k != key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn two_cores() -> (Topology, ComponentKey, ComponentKey, ComponentKey) {
        let mut topo = Topology::new();
        let node = topo.add_component(Some(topo.root()), Component::node(1)).unwrap();
        let a = topo.add_component(Some(node), Component::core(1)).unwrap();
        let b = topo.add_component(Some(node), Component::core(2)).unwrap();
        (topo, node, a, b)
    }

    #[test]
    fn test_oriented_registration() {
        let (mut topo, _, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::Logical))
            .unwrap();

        assert_eq!(topo.get_data_paths(a, Direction::Outgoing).unwrap(), vec![dp]);
        assert!(topo.get_data_paths(a, Direction::Incoming).unwrap().is_empty());
        assert_eq!(topo.get_data_paths(b, Direction::Incoming).unwrap(), vec![dp]);
        assert!(topo.get_data_paths(b, Direction::Outgoing).unwrap().is_empty());
    }

    #[test]
    fn test_bidirectional_registration() {
        let (mut topo, _, a, b) = two_cores();
        let dp = topo
            .create_data_path(
                DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::Physical)
                    .with_metrics(10.0, 0.5),
            )
            .unwrap();

        for c in [a, b] {
            assert_eq!(topo.get_data_paths(c, Direction::Outgoing).unwrap(), vec![dp]);
            assert_eq!(topo.get_data_paths(c, Direction::Incoming).unwrap(), vec![dp]);
            assert_eq!(topo.get_data_paths(c, Direction::Any).unwrap(), vec![dp]);
        }
        assert_eq!(topo.data_path(dp).unwrap().bandwidth(), 10.0);
    }

    #[test]
    fn test_filter_by_type() {
        let (mut topo, node, a, b) = two_cores();
        let logical = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::Logical))
            .unwrap();
        let physical = topo
            .create_data_path(DataPath::new(a, node, PathOrientation::Oriented, DataPathType::Physical))
            .unwrap();

        assert_eq!(
            topo.get_data_path_by_type(a, DataPathType::Physical, Direction::Outgoing).unwrap(),
            Some(physical)
        );
        assert_eq!(
            topo.get_all_data_paths_by_type(a, DataPathType::Logical, Direction::Any).unwrap(),
            vec![logical]
        );
        assert_eq!(
            topo.get_data_path_by_type(a, DataPathType::Mig, Direction::Any).unwrap(),
            None
        );
    }

    #[test]
    fn test_update_source_moves_registration() {
        let (mut topo, node, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::None))
            .unwrap();

        topo.update_source(dp, node).unwrap();
        assert!(topo.get_data_paths(a, Direction::Any).unwrap().is_empty());
        assert_eq!(topo.get_data_paths(node, Direction::Outgoing).unwrap(), vec![dp]);
        assert_eq!(topo.get_data_paths(b, Direction::Incoming).unwrap(), vec![dp]);
        assert_eq!(topo.data_path(dp).unwrap().source(), node);
    }

    #[test]
    fn test_update_target_bidirectional() {
        let (mut topo, node, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::C2C))
            .unwrap();

        topo.update_target(dp, node).unwrap();
        assert!(topo.get_data_paths(b, Direction::Any).unwrap().is_empty());
        assert_eq!(topo.get_data_paths(node, Direction::Incoming).unwrap(), vec![dp]);
        assert_eq!(topo.get_data_paths(node, Direction::Outgoing).unwrap(), vec![dp]);
        assert_eq!(topo.get_data_paths(a, Direction::Outgoing).unwrap(), vec![dp]);
    }

    #[test]
    fn test_self_loop_update() {
        let (mut topo, _, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, a, PathOrientation::Bidirectional, DataPathType::None))
            .unwrap();
        topo.update_source(dp, b).unwrap();
        assert_eq!(topo.get_data_paths(a, Direction::Any).unwrap(), vec![dp]);
        assert_eq!(topo.get_data_paths(b, Direction::Any).unwrap(), vec![dp]);
    }

    #[test]
    fn test_delete_data_path_clears_both_endpoints() {
        let (mut topo, _, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::None))
            .unwrap();

        let removed = topo.delete_data_path(dp).unwrap();
        assert_eq!(removed.source(), a);
        assert!(topo.get_data_paths(a, Direction::Any).unwrap().is_empty());
        assert!(topo.get_data_paths(b, Direction::Any).unwrap().is_empty());
        assert!(matches!(topo.data_path(dp), Err(TopologyError::StaleDataPath(_))));
    }

    #[test]
    fn test_delete_all_data_paths() {
        let (mut topo, node, a, b) = two_cores();
        topo.create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::None))
            .unwrap();
        topo.create_data_path(DataPath::new(node, a, PathOrientation::Oriented, DataPathType::None))
            .unwrap();
        let kept = topo
            .create_data_path(DataPath::new(node, b, PathOrientation::Oriented, DataPathType::None))
            .unwrap();

        assert_eq!(topo.delete_all_data_paths(a).unwrap(), 2);
        assert_eq!(topo.get_data_paths(b, Direction::Any).unwrap(), vec![kept]);
        assert_eq!(topo.get_data_paths(node, Direction::Any).unwrap(), vec![kept]);
    }

    #[test]
    fn test_add_data_path_requires_endpoint() {
        let (mut topo, node, a, b) = two_cores();
        let dp = topo
            .create_data_path(DataPath::new(a, b, PathOrientation::Oriented, DataPathType::None))
            .unwrap();

        assert!(matches!(
            topo.add_data_path(node, dp, Direction::Outgoing),
            Err(TopologyError::NotAnEndpoint { .. })
        ));
        topo.add_data_path(b, dp, Direction::Outgoing).unwrap();
        assert_eq!(topo.get_data_paths(b, Direction::Any).unwrap(), vec![dp]);
        topo.delete_data_path(dp).unwrap();
        assert!(topo.get_data_paths(b, Direction::Any).unwrap().is_empty());
    }

    #[test]
    fn test_type_codes() {
        for t in DataPathType::ALL {
            assert_eq!(DataPathType::from_code(t.code()), Some(t));
        }
        assert_eq!(DataPathType::from_code(3), None);
    }
}
