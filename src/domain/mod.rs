//! Domain model: aggregates, value objects and the jobs they emit
pub mod aggregates;
pub mod events;
pub mod value_objects;
