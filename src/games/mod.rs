//! Game rule boundaries and wire types.

pub mod quoridor;
