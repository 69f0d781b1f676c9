//! Probes the disks taking part in a clone.
//!
//! A [`DiskManager`] answers every question the planner asks about a drive,
//! whether that drive is a plain block device or an LVM volume group. All
//! answers come from the same tools an administrator would run by hand, so
//! what the inspector reports is what `sgdisk`, `sfdisk`, and `lvs` report.

extern crate disk_types;
extern crate drivesync_external_commands as external;
#[macro_use]
extern crate failure_derive;
extern crate itertools;
extern crate libc;
#[macro_use]
extern crate log;
extern crate partition_identity;
extern crate proc_mounts;
extern crate sys_mount;
extern crate tempdir;

mod block;
mod error;
mod lvm;
mod manager;
mod usage;

pub use self::{block::*, error::*, lvm::*, manager::*};
