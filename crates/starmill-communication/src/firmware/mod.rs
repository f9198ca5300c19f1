//! Controller firmware support

pub mod grbl;
