use disk_ops::{IncompatibleLayout, PlanError};
use disk_types::PartitionId;
use disks::DiskError;
use std::{io, path::PathBuf};

/// Errors that may arise while cloning one drive onto another.
#[derive(Debug, Fail)]
pub enum CloneError {
    #[fail(display = "target is smaller than the source and resizing is disabled")]
    ResizeDisabled,
    #[fail(display = "target layout cannot receive the source's data: {}", why)]
    Incompatible { why: IncompatibleLayout },
    #[fail(display = "no layout fits the target: {}", why)]
    Plan { why: PlanError },
    #[fail(display = "{}", why)]
    Device { why: DiskError },
    #[fail(display = "unable to write partition table to {:?}: {}", device, why)]
    TableWrite { device: PathBuf, why: io::Error },
    #[fail(display = "unable to copy files for partition {}: {}", partition, why)]
    Copy { partition: PartitionId, why: io::Error },
    #[fail(display = "unable to install the bootloader: {}", why)]
    Bootloader { why: io::Error },
    #[fail(display = "no bootloader strategy is named {}", name)]
    UnknownStrategy { name: String },
}

impl From<DiskError> for CloneError {
    fn from(why: DiskError) -> CloneError { CloneError::Device { why } }
}

impl From<PlanError> for CloneError {
    fn from(why: PlanError) -> CloneError { CloneError::Plan { why } }
}

impl From<IncompatibleLayout> for CloneError {
    fn from(why: IncompatibleLayout) -> CloneError { CloneError::Incompatible { why } }
}
