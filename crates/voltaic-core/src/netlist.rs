//! The netlist view: topology, node interning and per-analysis
//! auxiliary-row bookkeeping.
//!
//! Devices are enumerated in insertion order. The order is part of the
//! contract: stamping uses `+=`, so while any order yields the same
//! system under exact arithmetic, different orders round differently.

use indexmap::IndexMap;

use crate::device::{Analysis, Device};
use crate::node::NodeId;

/// A circuit: an ordered device list plus the node name table.
pub struct Netlist {
    devices: Vec<Box<dyn Device>>,
    nodes: IndexMap<String, NodeId>,
}

impl Netlist {
    pub fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert("0".to_string(), NodeId::GROUND);
        Self {
            devices: Vec::new(),
            nodes,
        }
    }

    /// Intern a node name, allocating the next free id on first use.
    /// `"0"` and `"gnd"` (any case) resolve to the ground reference.
    pub fn node(&mut self, name: &str) -> NodeId {
        if name == "0" || name.eq_ignore_ascii_case("gnd") {
            return NodeId::GROUND;
        }
        if let Some(&id) = self.nodes.get(name) {
            return id;
        }
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.insert(name.to_string(), id);
        id
    }

    /// Look up an already-interned node.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.get(name).copied()
    }

    /// Append a device; returns its index in the stable enumeration.
    pub fn add(&mut self, device: impl Device + 'static) -> usize {
        self.devices.push(Box::new(device));
        self.devices.len() - 1
    }

    /// Number of uniquely named nodes, ground included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of auxiliary current unknowns for the given analysis.
    pub fn num_aux(&self, analysis: Analysis) -> usize {
        self.devices.iter().map(|d| d.aux_count(analysis)).sum()
    }

    /// Full MNA dimension `n + m` for the given analysis.
    pub fn system_size(&self, analysis: Analysis) -> usize {
        self.num_nodes() + self.num_aux(analysis)
    }

    /// Length of the solution vector for the given analysis
    /// (`n + m - 1`, ground removed).
    pub fn unknown_count(&self, analysis: Analysis) -> usize {
        self.system_size(analysis) - 1
    }

    /// Per-device starting auxiliary row (full-matrix index) for the
    /// given analysis, `None` for devices with no auxiliaries.
    pub fn aux_map(&self, analysis: Analysis) -> Vec<Option<usize>> {
        let mut next = self.num_nodes();
        self.devices
            .iter()
            .map(|d| {
                let count = d.aux_count(analysis);
                if count == 0 {
                    None
                } else {
                    let start = next;
                    next += count;
                    Some(start)
                }
            })
            .collect()
    }

    pub fn devices(&self) -> &[Box<dyn Device>] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Box<dyn Device>] {
        &mut self.devices
    }

    /// Does any device require Newton iteration?
    pub fn has_nonlinear_devices(&self) -> bool {
        self.devices.iter().any(|d| d.is_nonlinear())
    }
}

impl Default for Netlist {
    fn default() -> Self {
        Self::new()
    }
}
