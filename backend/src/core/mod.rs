//! Round sequencing primitives

pub mod rounds;
