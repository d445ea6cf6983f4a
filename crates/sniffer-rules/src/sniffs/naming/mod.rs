//! Naming sniffs

mod global_qualification;

pub use global_qualification::GlobalQualificationSniff;
