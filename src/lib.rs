//! Clones one Linux drive onto another, shrinking the partition layout when
//! the target is smaller than the source.
//!
//! A [`Cloner`] pairs a source drive with a target, rebuilds the target's
//! partition table from a plan that fits, formats the new partitions, copies
//! the files with rsync, and finally rewrites filesystem identifiers so the
//! clone boots on its own.

extern crate disk_types;
extern crate drivesync_disk_ops as disk_ops;
extern crate drivesync_disks as disks;
extern crate drivesync_external_commands as external;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate fern;
#[macro_use]
extern crate log;
extern crate tempdir;

pub mod bootloader;
mod cloner;
mod errors;
mod fstab;
pub mod logging;
mod process;
mod substitute;

pub use self::{cloner::*, errors::*, fstab::*, process::*, substitute::*};
pub use disk_ops::{
    IncompatibleLayout, PlanError, PlanEntry, PlannedSize, ResizePlan, ResizeRequest,
    MSDOS_DEFAULT_MARGIN,
};
pub use disk_types::{FileSystem, PartitionId, PartitionTable};
pub use disks::{BlockDevice, DiskError, DiskManager, LvmVolumeGroup};
