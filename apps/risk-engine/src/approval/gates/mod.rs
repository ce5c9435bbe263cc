//! The ordered gate sequence. One file per gate; each either passes,
//! records a multiplicative size factor, or hard-rejects.

pub mod circuit;
pub mod concentration;
pub mod correlation;
pub mod portfolio;
pub mod sector;
