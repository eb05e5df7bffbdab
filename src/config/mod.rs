//! Settings for agent-manager itself.
//!
//! This module defines the `ManagerConfig` struct that represents
//! `.agent-manager/config.yaml` under the project root. The file is optional;
//! every field has a default, and unknown fields are ignored for forward
//! compatibility.

mod model;
mod operations;


pub use model::ManagerConfig;
