//! Flutter-facing bindings of the contacts core.

pub mod api;
