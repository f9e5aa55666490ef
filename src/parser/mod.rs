pub mod cidr;
pub mod record;

pub use cidr::*;
pub use record::*;
