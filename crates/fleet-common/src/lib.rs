//! Fleet Common Types
//!
//! This crate provides the types shared by the fleet controller and its
//! command-line client.
//!
//! # Overview
//!
//! The fleet controller keeps a desired number of replicas of one service
//! running across a set of node agents. This crate contains:
//!
//! - **Agent protocol**: the `POST /start` body sent to node agents
//! - **Admin protocol**: `/scale`, `/add-node` and `/status` payloads
//! - **Replica model**: [`Replica`], [`ReplicaStatus`] and [`ClusterSnapshot`]
//! - **Errors**: the [`FleetError`] taxonomy and [`Result`] alias
//!
//! # Example
//!
//! ```
//! use fleet_common::{normalize_node_url, ScaleRequest};
//!
//! let node = normalize_node_url("http://10.0.0.5:9090/").unwrap();
//! assert_eq!(node, "http://10.0.0.5:9090");
//!
//! let desired = ScaleRequest { count: 3 }.desired().unwrap();
//! assert_eq!(desired, 3);
//! ```

pub mod protocol;

pub use protocol::*;
