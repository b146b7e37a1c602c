//! Core circuit representation for Voltaic.
//!
//! This crate defines the pieces every analysis engine builds on:
//!
//! - [`NodeId`] - circuit node identifiers (node 0 is the ground reference)
//! - [`MnaSystem`] - the Modified Nodal Analysis matrix pair `A`, `z`,
//!   generic over real or complex scalars
//! - [`Device`] - the contract every circuit element implements
//! - [`Netlist`] - the read-only topology view the engines consult
//! - [`TimePoint`] - one committed `(t, x)` pair of a transient history

pub mod consts;
pub mod device;
pub mod mna;
pub mod netlist;
pub mod node;

pub use device::{Analysis, Device, TimePoint};
pub use mna::{MnaScalar, MnaSystem};
pub use netlist::Netlist;
pub use node::{NodeId, unknown, voltage};
