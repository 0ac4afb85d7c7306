//! Database query functions organized by table.

pub mod messages;
pub mod people;
pub mod public_keys;
pub mod sessions;
