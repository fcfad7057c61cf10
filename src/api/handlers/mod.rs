pub mod events;
pub mod objects;
