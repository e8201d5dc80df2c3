pub mod domain;
pub mod error;
pub mod handle;
pub mod protocol;
