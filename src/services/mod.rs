/// Remote data manager bound to the local cache.
pub mod data_manager;
/// Deep-copy staging buffers and request body assembly.
pub mod deep_copy;
/// Walking directions web service.
pub mod directions;
/// Position tracking and geofence checks.
pub mod location;
/// Delivery of background results to the UI loop.
pub mod ui_dispatch;
