//! Resource state tracking and transition barrier resolution.
//!
//! Command contexts record intended resource usage as they go; transitions
//! whose prior state is unknown to the context become pending barriers.
//! At submission the pending list is resolved against the process-wide
//! registry and the context's final states are committed back, all under
//! one registry lock so no other context can interleave.

/// Barrier descriptions and the sink trait command streams implement.
pub mod barrier;
/// The process-wide registry of last-known resource states.
pub mod registry;
/// Resource identities, usage states, and per-subresource records.
pub mod resource;
/// Per-context barrier recording and resolution.
pub mod tracker;
