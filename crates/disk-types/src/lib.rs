#[macro_use]
extern crate failure_derive;

mod fs;
mod naming;
mod partition;
mod table;

pub use self::{fs::*, naming::*, partition::*, table::*};

/// All sizes in this workspace are expressed in 512-byte sectors.
pub const SECTOR_SIZE: u64 = 512;
