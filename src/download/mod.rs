pub mod client;
pub mod extract;
pub mod workdir;

pub use client::*;
pub use extract::*;
pub use workdir::*;
