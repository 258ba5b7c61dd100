//! Core types for the lattice sliced-ledger network.
//!
//! This crate provides the foundational types used by the networking
//! layer:
//!
//! - **Primitives**: [`Hash`], [`BlockNumber`], [`Location`]
//! - **Payloads**: [`Block`], [`Header`], [`Transaction`]
//! - **Wire discriminators**: [`TypeTag`], [`Selector`], [`Payload`]
//!
//! It is self-contained with minimal dependencies and does not depend on
//! any other workspace crate, making it the foundation layer.

mod entities;
mod hash;
mod location;
mod number;
mod tag;

pub use entities::{Block, Header, Transaction};
pub use hash::{Hash, HexError};
pub use location::Location;
pub use number::BlockNumber;
pub use tag::{Payload, Selector, TypeTag};
