//! SQLite relationship modeling and association demos.
//!
//! # Intention
//!
//! - Model one-to-one, one-to-many, and many-to-many associations over a
//!   file-backed SQLite database.
//! - Keep schema declaration, relationship wiring, and query execution in a
//!   small reusable layer; the demos are thin flows on top of it.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/relationship code belongs here.
//! - No business logic beyond the three demonstration flows in [`demos`].

pub mod demos;
pub mod error;
pub mod query;
pub mod relation;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{Error, Result};
