pub mod channel;
pub mod directory;
pub mod events;
pub mod online;
pub mod registry;
pub mod relay_engine;
