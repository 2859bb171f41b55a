//! Client core for the ARFollow treasure-hunt game: backend data manager,
//! local replication cache, staging buffers and geofencing.

pub mod config;
/// Local replication cache: context tiers, disk stores and entities.
pub mod dao;
pub mod dto;
/// Error categories and the status payload shown to the user.
pub mod error;
pub mod routes;
/// Data manager, staging buffers, geofencing, directions and UI dispatch.
pub mod services;
pub mod state;
