//! Synchronizes a two-player puzzle game session through a keyed store with
//! change notifications.
//!
//! Two clients agree on a shared game setup (board dimension, turn duration,
//! two starting tiles) and then exchange moves through a single overwritten
//! `lastMove` record. The store is a dumb, trusting key tree; every
//! correctness rule lives client-side.

pub mod models;
pub mod repositories;
pub mod services;
pub mod store;
