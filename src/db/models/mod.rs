//! Database models split into separate files.

pub mod option;
pub mod show;

pub use self::option::*;
pub use self::show::*;
