//! Route modules, one per API domain.

pub mod convert;
