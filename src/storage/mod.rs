//! On-disk storage: block framing and the content-addressed row heap

pub mod heap;
pub mod packer;
