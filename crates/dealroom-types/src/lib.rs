//! Types shared by every dealroom crate: persisted entities, HTTP payloads
//! and the notification intents handed to the delivery collaborator.

pub mod api;
pub mod events;
pub mod models;
pub mod time;
