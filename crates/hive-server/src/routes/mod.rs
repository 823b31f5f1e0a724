pub mod agents;
pub mod auth;
pub mod events;
pub mod messages;
pub mod state;
pub mod tasks;
