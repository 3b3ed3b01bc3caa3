//! Schema artefacts, one module per protocol domain

pub mod debugger;
pub mod dom;
pub mod page;
pub mod runtime;
