//! Tools for planning a shrunken partition layout and writing it to a disk.
//!
//! Planning is pure arithmetic over sector counts, so every decision about
//! how much each partition gives up can be unit tested without a device.
//! Materialization then turns a plan into `sgdisk`, `sfdisk`, or `lvcreate`
//! invocations.

#[macro_use]
extern crate derive_new;
extern crate disk_types;
extern crate drivesync_external_commands as external;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

mod check;
mod mklabel;
mod msdos;
mod plan;

pub use self::{check::*, mklabel::*, msdos::*, plan::*};

/// Sectors at the tail of a GPT disk that the backup header occupies.
pub const GPT_RESERVED_TRAILING: u64 = 34;

/// Percent of a partition's free space left untouched when shrinking an
/// MS-DOS layout, so the filesystem is not packed completely full.
pub const MSDOS_DEFAULT_MARGIN: u64 = 5;
