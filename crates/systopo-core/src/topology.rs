//! Topology arena: the component tree plus the data-path graph
//!
//! All components and data paths of one topology live in generational
//! arenas owned by [`Topology`]. Tree links and path registrations are keys,
//! so deleting a component can never leave a reference to freed memory;
//! a stale key simply fails to resolve.

use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

use crate::arena::{Arena, ComponentKey, DataPathKey};
use crate::attribute::AttributeError;
use crate::component::{Component, ComponentType};
use crate::datapath::{DataPath, Direction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Component {0} does not exist (deleted or never inserted)")]
    StaleComponent(ComponentKey),
    #[error("Data path {0} does not exist (deleted or never inserted)")]
    StaleDataPath(DataPathKey),
    #[error("Component {child} is not a child of {parent}")]
    NotAChild {
        parent: ComponentKey,
        child: ComponentKey,
    },
    #[error("Component {component} is not an endpoint of {path}")]
    NotAnEndpoint {
        component: ComponentKey,
        path: DataPathKey,
    },
    #[error("Inserting {child} under {parent} would create a cycle")]
    WouldCreateCycle {
        parent: ComponentKey,
        child: ComponentKey,
    },
    #[error("The root component of a topology cannot be deleted")]
    RootDeletion,
    #[error("The root component of a topology cannot be given a parent")]
    RootReparent,
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

/// Number of components and distinct data paths in a subtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologySize {
    pub components: usize,
    pub data_paths: usize,
}

/// Owning arena of a component tree and its data paths
pub struct Topology {
    pub(crate) components: Arena<ComponentKey, Component>,
    pub(crate) paths: Arena<DataPathKey, DataPath>,
    root: ComponentKey,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// Create a topology whose root is a `Topology` component
    pub fn new() -> Self {
        Self::with_root(Component::topology())
    }

    /// Create a topology around a caller-provided root component
    pub fn with_root(mut root: Component) -> Self {
        root.parent = None;
        root.children.clear();
        root.outgoing.clear();
        root.incoming.clear();
        root.depth = 0;

        let mut components = Arena::new();
        let root = components.insert(root);
        Self {
            components,
            paths: Arena::new(),
            root,
        }
    }

    pub fn root(&self) -> ComponentKey {
        self.root
    }

    /// Number of live components, attached or not
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of live data paths
    pub fn data_path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.components.contains(key)
    }

    pub fn component(&self, key: ComponentKey) -> Result<&Component, TopologyError> {
        self.components
            .get(key)
            .ok_or(TopologyError::StaleComponent(key))
    }

    pub fn component_mut(&mut self, key: ComponentKey) -> Result<&mut Component, TopologyError> {
        self.components
            .get_mut(key)
            .ok_or(TopologyError::StaleComponent(key))
    }

    /// Store a component, attaching it under `parent` when given
    ///
    /// Any tree links or path registrations already on `component` are
    /// discarded; a new component starts detached.
    pub fn add_component(
        &mut self,
        parent: Option<ComponentKey>,
        mut component: Component,
    ) -> Result<ComponentKey, TopologyError> {
        component.parent = None;
        component.children.clear();
        component.outgoing.clear();
        component.incoming.clear();
        component.depth = 0;

        if let Some(parent) = parent {
            self.component(parent)?;
        }
        let key = self.components.insert(component);
        if let Some(parent) = parent {
            self.attach(parent, key);
            let depth = self.component(parent)?.depth + 1;
            self.component_mut(key)?.depth = depth;
        }
        Ok(key)
    }

    fn attach(&mut self, parent: ComponentKey, child: ComponentKey) {
        if let Some(p) = self.components.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.components.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn detach(&mut self, child: ComponentKey) {
        let parent = self.components.get(child).and_then(|c| c.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.components.get_mut(parent) {
                p.children.retain(|k| *k != child);
            }
        }
        if let Some(c) = self.components.get_mut(child) {
            c.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, candidate: ComponentKey, of: ComponentKey) -> bool {
        let mut current = Some(of);
        while let Some(key) = current {
            if key == candidate {
                return true;
            }
            current = self.components.get(key).and_then(|c| c.parent);
        }
        false
    }

    /// Make `child` the last child of `parent`
    ///
    /// A child that already has a parent is detached from it first. The root
    /// never takes a parent. Ids are not checked for uniqueness; see
    /// [`Topology::check_consistency`].
    pub fn insert_child(&mut self, parent: ComponentKey, child: ComponentKey) -> Result<(), TopologyError> {
        self.component(parent)?;
        self.component(child)?;
        if child == self.root {
            return Err(TopologyError::RootReparent);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TopologyError::WouldCreateCycle { parent, child });
        }

        self.detach(child);
        self.attach(parent, child);
        debug!(parent = %parent, child = %child, "Inserted child");
        Ok(())
    }

    /// Detach `child` from `parent` without deleting it
    ///
    /// The detached subtree stays in the arena until it is re-inserted or
    /// deleted.
    pub fn remove_child(&mut self, parent: ComponentKey, child: ComponentKey) -> Result<(), TopologyError> {
        if self.component(child)?.parent != Some(parent) {
            self.component(parent)?;
            return Err(TopologyError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    /// Splice `component` between `parent` and its existing child `child`
    ///
    /// When `already_child` is false, `component` is first inserted under
    /// `parent`. The subtree and data paths of `child` are untouched.
    pub fn insert_between_parent_and_child(
        &mut self,
        component: ComponentKey,
        parent: ComponentKey,
        child: ComponentKey,
        already_child: bool,
    ) -> Result<(), TopologyError> {
        self.insert_between_parent_and_children(component, parent, &[child], already_child)
    }

    /// Splice `component` between `parent` and several of its children
    pub fn insert_between_parent_and_children(
        &mut self,
        component: ComponentKey,
        parent: ComponentKey,
        children: &[ComponentKey],
        already_child: bool,
    ) -> Result<(), TopologyError> {
        for child in children {
            if self.component(*child)?.parent != Some(parent) {
                return Err(TopologyError::NotAChild {
                    parent,
                    child: *child,
                });
            }
            if *child == component {
                return Err(TopologyError::WouldCreateCycle {
                    parent: component,
                    child: component,
                });
            }
        }

        if !already_child {
            self.insert_child(parent, component)?;
        } else if self.component(component)?.parent != Some(parent) {
            return Err(TopologyError::NotAChild {
                parent,
                child: component,
            });
        }

        for child in children {
            self.detach(*child);
            self.attach(component, *child);
        }
        Ok(())
    }

    pub fn parent(&self, key: ComponentKey) -> Result<Option<ComponentKey>, TopologyError> {
        Ok(self.component(key)?.parent)
    }

    pub fn children(&self, key: ComponentKey) -> Result<&[ComponentKey], TopologyError> {
        Ok(self.component(key)?.children())
    }

    /// Pre-order walk of the subtree rooted at `key`, `key` first
    pub fn get_components_in_subtree(&self, key: ComponentKey) -> Result<Vec<ComponentKey>, TopologyError> {
        self.component(key)?;
        let mut out = Vec::new();
        let mut stack = vec![key];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(comp) = self.components.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(comp.children.iter().rev().copied());
        }
        Ok(out)
    }

    fn descendants(&self, key: ComponentKey) -> Result<impl Iterator<Item = ComponentKey>, TopologyError> {
        Ok(self.get_components_in_subtree(key)?.into_iter().skip(1))
    }

    fn type_of(&self, key: ComponentKey) -> Option<ComponentType> {
        self.components.get(key).map(Component::component_type)
    }

    fn id_of(&self, key: ComponentKey) -> Option<i32> {
        self.components.get(key).map(Component::id)
    }

    /// First direct child with the given id
    pub fn get_child_by_id(&self, key: ComponentKey, id: i32) -> Result<Option<ComponentKey>, TopologyError> {
        Ok(self
            .children(key)?
            .iter()
            .copied()
            .find(|c| self.id_of(*c) == Some(id)))
    }

    /// Same as [`Topology::get_child_by_id`]
    pub fn get_child(&self, key: ComponentKey, id: i32) -> Result<Option<ComponentKey>, TopologyError> {
        self.get_child_by_id(key, id)
    }

    pub fn get_child_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<Option<ComponentKey>, TopologyError> {
        Ok(self
            .children(key)?
            .iter()
            .copied()
            .find(|c| self.type_of(*c) == Some(component_type)))
    }

    pub fn get_all_children_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<Vec<ComponentKey>, TopologyError> {
        Ok(self
            .children(key)?
            .iter()
            .copied()
            .filter(|c| self.type_of(*c) == Some(component_type))
            .collect())
    }

    pub fn count_children_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<usize, TopologyError> {
        Ok(self.get_all_children_by_type(key, component_type)?.len())
    }

    /// First descendant (pre-order, excluding `key`) with the given id
    pub fn get_subcomponent_by_id(&self, key: ComponentKey, id: i32) -> Result<Option<ComponentKey>, TopologyError> {
        Ok(self.descendants(key)?.find(|c| self.id_of(*c) == Some(id)))
    }

    /// First descendant matching both id and type
    pub fn get_subcomponent_by_id_and_type(
        &self,
        key: ComponentKey,
        id: i32,
        component_type: ComponentType,
    ) -> Result<Option<ComponentKey>, TopologyError> {
        Ok(self
            .descendants(key)?
            .find(|c| self.id_of(*c) == Some(id) && self.type_of(*c) == Some(component_type)))
    }

    /// Every descendant of the given type, in pre-order
    pub fn get_all_subcomponents_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<Vec<ComponentKey>, TopologyError> {
        Ok(self
            .descendants(key)?
            .filter(|c| self.type_of(*c) == Some(component_type))
            .collect())
    }

    /// Same as [`Topology::get_all_subcomponents_by_type`]
    pub fn get_subcomponents_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<Vec<ComponentKey>, TopologyError> {
        self.get_all_subcomponents_by_type(key, component_type)
    }

    pub fn count_all_subcomponents(&self, key: ComponentKey) -> Result<usize, TopologyError> {
        Ok(self.descendants(key)?.count())
    }

    pub fn count_all_subcomponents_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<usize, TopologyError> {
        Ok(self.get_all_subcomponents_by_type(key, component_type)?.len())
    }

    /// Closest strict ancestor of the given type
    pub fn get_ancestor_by_type(
        &self,
        key: ComponentKey,
        component_type: ComponentType,
    ) -> Result<Option<ComponentKey>, TopologyError> {
        let mut current = self.component(key)?.parent;
        while let Some(ancestor) = current {
            let comp = self.component(ancestor)?;
            if comp.component_type() == component_type {
                return Ok(Some(ancestor));
            }
            current = comp.parent;
        }
        Ok(None)
    }

    /// Ancestor `n` levels up; `n == 0` is the component itself
    pub fn get_nth_ancestor(&self, key: ComponentKey, n: usize) -> Result<Option<ComponentKey>, TopologyError> {
        let mut current = key;
        self.component(current)?;
        for _ in 0..n {
            match self.component(current)?.parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Every descendant exactly `n` levels below; `n == 0` is the component
    pub fn get_nth_descendants(&self, key: ComponentKey, n: usize) -> Result<Vec<ComponentKey>, TopologyError> {
        let mut level = vec![key];
        self.component(key)?;
        for _ in 0..n {
            let mut next = Vec::new();
            for k in &level {
                next.extend_from_slice(self.children(*k)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            level = next;
        }
        Ok(level)
    }

    /// Number of levels below `key`; 0 for a leaf
    pub fn subtree_depth(&self, key: ComponentKey) -> Result<usize, TopologyError> {
        let mut depth = 0;
        let mut level = vec![key];
        self.component(key)?;
        loop {
            let mut next = Vec::new();
            for k in &level {
                next.extend_from_slice(self.children(*k)?);
            }
            if next.is_empty() {
                return Ok(depth);
            }
            depth += 1;
            level = next;
        }
    }

    /// Depth as last computed; may be stale after tree surgery
    pub fn cached_depth(&self, key: ComponentKey) -> Result<u32, TopologyError> {
        Ok(self.component(key)?.depth)
    }

    /// Recompute the depth of `key` by walking up to its root
    pub fn refresh_depth(&mut self, key: ComponentKey) -> Result<u32, TopologyError> {
        let mut depth = 0;
        let mut current = self.component(key)?.parent;
        while let Some(ancestor) = current {
            depth += 1;
            current = self.component(ancestor)?.parent;
        }
        self.component_mut(key)?.depth = depth;
        Ok(depth)
    }

    /// Depth of `key`, recomputed first when `refresh` is set
    pub fn get_depth(&mut self, key: ComponentKey, refresh: bool) -> Result<u32, TopologyError> {
        if refresh {
            self.refresh_depth(key)
        } else {
            self.cached_depth(key)
        }
    }

    /// Count components and distinct data paths in the subtree
    pub fn topology_size(&self, key: ComponentKey) -> Result<TopologySize, TopologyError> {
        let mut counted = HashSet::new();
        self.topology_size_with(key, &mut counted)
    }

    /// Like [`Topology::topology_size`], skipping paths already in `counted`
    ///
    /// Newly seen paths are added to `counted`, so several subtrees can be
    /// measured without counting a shared path twice.
    pub fn topology_size_with(
        &self,
        key: ComponentKey,
        counted: &mut HashSet<DataPathKey>,
    ) -> Result<TopologySize, TopologyError> {
        let mut size = TopologySize::default();
        for component in self.get_components_in_subtree(key)? {
            size.components += 1;
            let comp = self.component(component)?;
            for path in comp.outgoing.iter().chain(comp.incoming.iter()) {
                if counted.insert(*path) {
                    size.data_paths += 1;
                }
            }
        }
        Ok(size)
    }

    /// Delete everything below `key`, keeping `key` itself
    ///
    /// Every freed component has its data paths removed from both
    /// endpoints first, so survivors never hold a path to a freed component.
    pub fn delete_subtree(&mut self, key: ComponentKey) -> Result<(), TopologyError> {
        let doomed: Vec<_> = self.descendants(key)?.collect();
        for component in &doomed {
            self.delete_all_data_paths(*component)?;
        }
        for component in &doomed {
            self.components.remove(*component);
        }
        self.component_mut(key)?.children.clear();
        debug!(component = %key, freed = doomed.len(), "Deleted subtree");
        Ok(())
    }

    /// Delete `key`, either with its subtree or handing its children to its parent
    pub fn delete(&mut self, key: ComponentKey, with_subtree: bool) -> Result<(), TopologyError> {
        self.component(key)?;
        if key == self.root {
            return Err(TopologyError::RootDeletion);
        }
        if with_subtree {
            self.delete_subtree(key)?;
        }

        let parent = self.component(key)?.parent;
        self.detach(key);
        let children = std::mem::take(&mut self.component_mut(key)?.children);
        for child in children {
            if let Some(c) = self.components.get_mut(child) {
                c.parent = None;
            }
            if let Some(parent) = parent {
                self.attach(parent, child);
            }
        }

        self.delete_all_data_paths(key)?;
        self.components.remove(key);
        debug!(component = %key, with_subtree, "Deleted component");
        Ok(())
    }

    /// Human-readable outline of the subtree, one component per line
    ///
    /// `max_depth` limits how many levels below `key` are printed.
    pub fn render_subtree(&self, key: ComponentKey, max_depth: Option<usize>) -> Result<String, TopologyError> {
        let mut out = String::new();
        let mut stack = vec![(key, 0usize)];
        while let Some((current, level)) = stack.pop() {
            let comp = self.component(current)?;
            let _ = writeln!(
                out,
                "{}{} (name {}) id {}",
                "  ".repeat(level),
                comp.component_type_str(),
                comp.name(),
                comp.id()
            );
            for (name, _) in comp.attributes().iter() {
                let _ = writeln!(out, "{}  - attribute {}", "  ".repeat(level), name);
            }
            if max_depth.map_or(true, |max| level < max) {
                stack.extend(comp.children.iter().rev().map(|c| (*c, level + 1)));
            }
        }
        Ok(out)
    }

    /// Human-readable list of the data paths of every component in the subtree
    pub fn render_data_paths(&self, key: ComponentKey) -> Result<String, TopologyError> {
        let mut out = String::new();
        for component in self.get_components_in_subtree(key)? {
            let comp = self.component(component)?;
            let paths = self.get_data_paths(component, Direction::Any)?;
            if paths.is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "DataPaths regarding {} (name {}) id {}",
                comp.component_type_str(),
                comp.name(),
                comp.id()
            );
            for path in paths {
                let dp = self.data_path(path)?;
                let (label, other) = if dp.source() == component {
                    ("to", dp.target())
                } else {
                    ("from", dp.source())
                };
                let other = self.component(other)?;
                let _ = writeln!(
                    out,
                    "    {} {} (name {}) id {} - bw {}, latency {}, type {}{}",
                    label,
                    other.component_type_str(),
                    other.name(),
                    other.id(),
                    dp.bandwidth(),
                    dp.latency(),
                    dp.path_type(),
                    if dp.is_oriented() { "" } else { ", bidirectional" }
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::OpaqueValue;
    use crate::datapath::{DataPathType, PathOrientation};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Topology -> Node(1) -> { Chip(0) -> { Core(1) -> Thread(0), Core(2) }, Memory(0) }
    fn sample() -> (Topology, [ComponentKey; 6]) {
        let mut topo = Topology::new();
        let root = topo.root();
        let node = topo.add_component(Some(root), Component::node(1)).unwrap();
        let chip = topo
            .add_component(
                Some(node),
                Component::chip(0, "cpu0", crate::ChipType::Cpu, "Intel", "Xeon"),
            )
            .unwrap();
        let core1 = topo.add_component(Some(chip), Component::core(1)).unwrap();
        let thread = topo.add_component(Some(core1), Component::thread(0)).unwrap();
        let core2 = topo.add_component(Some(chip), Component::core(2)).unwrap();
        let mem = topo
            .add_component(Some(node), Component::memory(0, "DRAM", 1 << 34, true))
            .unwrap();
        (topo, [node, chip, core1, thread, core2, mem])
    }

    #[test]
    fn test_lookup_queries() {
        let (topo, [node, chip, core1, thread, core2, mem]) = sample();
        let root = topo.root();

        assert_eq!(topo.get_child_by_id(chip, 2).unwrap(), Some(core2));
        assert_eq!(topo.get_child(chip, 7).unwrap(), None);
        assert_eq!(topo.get_child_by_type(node, ComponentType::Memory).unwrap(), Some(mem));
        assert_eq!(
            topo.get_all_children_by_type(chip, ComponentType::Core).unwrap(),
            vec![core1, core2]
        );
        assert_eq!(topo.count_children_by_type(node, ComponentType::Core).unwrap(), 0);

        assert_eq!(topo.get_subcomponent_by_id(root, 1).unwrap(), Some(node));
        assert_eq!(
            topo.get_subcomponent_by_id_and_type(root, 1, ComponentType::Core).unwrap(),
            Some(core1)
        );
        assert_eq!(
            topo.get_all_subcomponents_by_type(root, ComponentType::Core).unwrap(),
            vec![core1, core2]
        );
        assert_eq!(topo.count_all_subcomponents(root).unwrap(), 6);
        assert_eq!(
            topo.count_all_subcomponents_by_type(node, ComponentType::Thread).unwrap(),
            1
        );
        assert_eq!(
            topo.get_components_in_subtree(chip).unwrap(),
            vec![chip, core1, thread, core2]
        );
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let (topo, [node, chip, core1, thread, core2, mem]) = sample();
        let root = topo.root();

        assert_eq!(topo.get_ancestor_by_type(thread, ComponentType::Chip).unwrap(), Some(chip));
        assert_eq!(topo.get_ancestor_by_type(thread, ComponentType::Thread).unwrap(), None);
        assert_eq!(topo.get_nth_ancestor(thread, 0).unwrap(), Some(thread));
        assert_eq!(topo.get_nth_ancestor(thread, 3).unwrap(), Some(node));
        assert_eq!(topo.get_nth_ancestor(thread, 9).unwrap(), None);

        assert_eq!(topo.get_nth_descendants(node, 0).unwrap(), vec![node]);
        assert_eq!(topo.get_nth_descendants(node, 1).unwrap(), vec![chip, mem]);
        assert_eq!(topo.get_nth_descendants(node, 2).unwrap(), vec![core1, core2]);
        assert!(topo.get_nth_descendants(node, 5).unwrap().is_empty());

        assert_eq!(topo.subtree_depth(root).unwrap(), 4);
        assert_eq!(topo.subtree_depth(core2).unwrap(), 0);
    }

    #[test]
    fn test_depth_goes_stale_until_refreshed() {
        let (mut topo, [node, _chip, core1, thread, _core2, _mem]) = sample();
        assert_eq!(topo.cached_depth(thread).unwrap(), 4);

        topo.insert_child(node, thread).unwrap();
        assert_eq!(topo.get_depth(thread, false).unwrap(), 4);
        assert_eq!(topo.get_depth(thread, true).unwrap(), 2);
        assert_eq!(topo.cached_depth(thread).unwrap(), 2);
        assert_eq!(topo.refresh_depth(node).unwrap(), 1);
        assert!(topo.children(core1).unwrap().is_empty());
    }

    #[test]
    fn test_insert_child_rejects_cycles() {
        let (mut topo, [node, chip, ..]) = sample();
        assert!(matches!(
            topo.insert_child(chip, node),
            Err(TopologyError::WouldCreateCycle { .. })
        ));
        assert!(matches!(
            topo.insert_child(chip, chip),
            Err(TopologyError::WouldCreateCycle { .. })
        ));
    }

    #[test]
    fn test_remove_child_detaches_without_deleting() {
        let (mut topo, [node, chip, core1, ..]) = sample();
        topo.remove_child(node, chip).unwrap();
        assert_eq!(topo.parent(chip).unwrap(), None);
        assert!(!topo.children(node).unwrap().contains(&chip));
        assert_eq!(topo.parent(core1).unwrap(), Some(chip));
        assert!(matches!(
            topo.remove_child(node, chip),
            Err(TopologyError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_insert_between_parent_and_child() {
        let (mut topo, [_node, chip, core1, thread, core2, _mem]) = sample();
        let dp = topo
            .create_data_path(DataPath::new(
                thread,
                core2,
                PathOrientation::Oriented,
                DataPathType::Logical,
            ))
            .unwrap();

        let cache = topo
            .add_component(None, Component::cache(0, 2, 1 << 20, 16, 64))
            .unwrap();
        topo.insert_between_parent_and_child(cache, chip, core1, false).unwrap();

        assert_eq!(topo.children(chip).unwrap(), &[core2, cache]);
        assert_eq!(topo.children(cache).unwrap(), &[core1]);
        assert_eq!(topo.parent(core1).unwrap(), Some(cache));
        assert_eq!(topo.children(core1).unwrap(), &[thread]);
        assert_eq!(topo.get_data_paths(thread, Direction::Outgoing).unwrap(), vec![dp]);
    }

    #[test]
    fn test_insert_between_parent_and_children_already_child() {
        let (mut topo, [_node, chip, core1, _thread, core2, _mem]) = sample();
        let l3 = topo
            .add_component(Some(chip), Component::cache(0, 3, 1 << 25, 12, 64))
            .unwrap();
        topo.insert_between_parent_and_children(l3, chip, &[core1, core2], true)
            .unwrap();
        assert_eq!(topo.children(chip).unwrap(), &[l3]);
        assert_eq!(topo.children(l3).unwrap(), &[core1, core2]);

        let err = topo
            .insert_between_parent_and_child(core1, chip, core2, true)
            .unwrap_err();
        assert!(matches!(err, TopologyError::NotAChild { .. }));
    }

    #[test]
    fn test_topology_size_counts_shared_paths_once() {
        let mut topo = Topology::new();
        let root = topo.root();
        let node = topo.add_component(Some(root), Component::node(1)).unwrap();
        let a = topo.add_component(Some(node), Component::core(1)).unwrap();
        let b = topo.add_component(Some(node), Component::core(2)).unwrap();
        topo.create_data_path(
            DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::Physical)
                .with_metrics(10.0, 0.5),
        )
        .unwrap();

        assert_eq!(
            topo.topology_size(root).unwrap(),
            TopologySize {
                components: 4,
                data_paths: 1
            }
        );

        let mut counted = HashSet::new();
        let first = topo.topology_size_with(a, &mut counted).unwrap();
        let second = topo.topology_size_with(b, &mut counted).unwrap();
        assert_eq!(first.data_paths + second.data_paths, 1);
    }

    #[test]
    fn test_delete_core_removes_path_from_peer() {
        let mut topo = Topology::new();
        let node = topo.add_component(Some(topo.root()), Component::node(1)).unwrap();
        let a = topo.add_component(Some(node), Component::core(1)).unwrap();
        let b = topo.add_component(Some(node), Component::core(2)).unwrap();
        let dp = topo
            .create_data_path(
                DataPath::new(a, b, PathOrientation::Bidirectional, DataPathType::Physical)
                    .with_metrics(10.0, 0.5),
            )
            .unwrap();

        topo.delete(a, true).unwrap();
        assert!(topo.get_data_paths(b, Direction::Any).unwrap().is_empty());
        assert!(topo.data_path(dp).is_err());
        assert_eq!(topo.children(node).unwrap(), &[b]);
        assert!(matches!(topo.component(a), Err(TopologyError::StaleComponent(_))));
    }

    #[test]
    fn test_delete_subtree_leaves_no_dangling_paths() {
        let (mut topo, [node, chip, core1, thread, core2, mem]) = sample();
        let root = topo.root();
        topo.create_data_path(DataPath::new(thread, mem, PathOrientation::Oriented, DataPathType::DataTransfer))
            .unwrap();
        topo.create_data_path(DataPath::new(core2, core1, PathOrientation::Bidirectional, DataPathType::None))
            .unwrap();
        topo.create_data_path(DataPath::new(mem, node, PathOrientation::Oriented, DataPathType::None))
            .unwrap();

        topo.delete_subtree(chip).unwrap();
        assert!(topo.children(chip).unwrap().is_empty());
        assert_eq!(topo.data_path_count(), 1);
        for k in [core1, thread, core2] {
            assert!(!topo.contains(k));
        }
        for survivor in topo.get_components_in_subtree(root).unwrap() {
            for path in topo.get_data_paths(survivor, Direction::Any).unwrap() {
                let dp = topo.data_path(path).unwrap();
                assert!(topo.contains(dp.source()) && topo.contains(dp.target()));
            }
        }
        assert!(topo.check_consistency(root).unwrap().is_consistent());
    }

    #[test]
    fn test_delete_without_subtree_reparents_children() {
        let (mut topo, [node, chip, core1, _thread, core2, mem]) = sample();
        topo.delete(chip, false).unwrap();
        assert_eq!(topo.children(node).unwrap(), &[mem, core1, core2]);
        assert_eq!(topo.parent(core1).unwrap(), Some(node));
    }

    #[test]
    fn test_root_cannot_take_a_parent() {
        let (mut topo, [node, ..]) = sample();
        let root = topo.root();
        let detached = topo.add_component(None, Component::node(9)).unwrap();

        assert_eq!(topo.insert_child(detached, root), Err(TopologyError::RootReparent));
        assert_eq!(topo.insert_child(node, root), Err(TopologyError::RootReparent));
        let spare = topo.add_component(Some(detached), Component::core(0)).unwrap();
        assert_eq!(
            topo.insert_between_parent_and_child(root, detached, spare, false),
            Err(TopologyError::RootReparent)
        );
        assert_eq!(topo.parent(root).unwrap(), None);
        assert_eq!(topo.children(detached).unwrap(), &[spare]);
        assert!(topo.check_consistency(root).unwrap().is_consistent());
    }

    #[test]
    fn test_root_cannot_be_deleted() {
        let (mut topo, _) = sample();
        let root = topo.root();
        assert_eq!(topo.delete(root, true), Err(TopologyError::RootDeletion));
        topo.delete_subtree(root).unwrap();
        assert_eq!(topo.component_count(), 1);
    }

    #[test]
    fn test_delete_releases_attributes() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (mut topo, [node, _chip, _core1, thread, ..]) = sample();
        let drops = Arc::new(AtomicUsize::new(0));
        topo.component_mut(thread)
            .unwrap()
            .set_attribute("tracked", OpaqueValue::new(Tracked(drops.clone())))
            .unwrap();
        topo.delete(node, true).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_subtree() {
        let (topo, [_, chip, ..]) = sample();
        let text = topo.render_subtree(chip, Some(1)).unwrap();
        assert_eq!(
            text,
            "Chip (name cpu0) id 0\n  Core (name Core) id 1\n  Core (name Core) id 2\n"
        );
        let full = topo.render_subtree(chip, None).unwrap();
        assert!(full.contains("    HW_thread (name Thread) id 0"));
    }

    #[test]
    fn test_render_data_paths() {
        let (mut topo, [_, chip, core1, _, core2, _]) = sample();
        topo.create_data_path(
            DataPath::new(core1, core2, PathOrientation::Oriented, DataPathType::Logical)
                .with_metrics(5.0, 1.5),
        )
        .unwrap();
        let text = topo.render_data_paths(chip).unwrap();
        assert!(text.contains("to Core (name Core) id 2 - bw 5, latency 1.5, type logical"));
        assert!(text.contains("from Core (name Core) id 1"));
    }
}
