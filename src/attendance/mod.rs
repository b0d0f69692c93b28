pub mod error;
pub mod policy;
pub mod scan;
pub mod sweep;
