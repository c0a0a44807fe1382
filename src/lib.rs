//! vrfctl - Linux VRF lifecycle management and verification
//!
//! Creates and deletes VRF devices, keeps their default routes and FIB
//! rules in place, classifies tasks into VRFs through a cgroup hierarchy,
//! and audits live kernel routing state for inconsistencies.

pub mod cgroup;
pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod lock;
pub mod retry;
pub mod routing;
pub mod services;
pub mod verify;
pub mod vrf;

pub use error::AppError;
