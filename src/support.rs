//! Supporting utilities used by physics modules and the assembly system.
//!
//! These modules are public because they are useful on their own, but their
//! APIs are not stable. Breaking changes may occur as needed.

pub mod config;
pub mod constraint;
pub mod fe;
pub mod mesh;
pub mod property;
pub mod stabilization;
