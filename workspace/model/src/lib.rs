//! SeaORM entities for the finance tracker.

pub mod entities;
