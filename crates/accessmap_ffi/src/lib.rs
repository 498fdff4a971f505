//! Flutter-facing bindings for the AccessMap core.

pub mod api;
