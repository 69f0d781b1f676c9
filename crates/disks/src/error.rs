pub use disk_types::PartitionTableError;
use disk_types::PartitionId;
use std::{io, path::PathBuf};

/// Errors that arise while inspecting or manipulating the drives in a clone.
#[derive(Debug, Fail)]
pub enum DiskError {
    #[fail(display = "unable to query {:?}: {}", device, why)]
    Query { device: PathBuf, why: io::Error },
    #[fail(display = "{:?} cannot be mounted for inspection", device)]
    NotMountable { device: PathBuf },
    #[fail(display = "partition table on {:?} is not supported: {}", device, why)]
    UnsupportedTable { device: PathBuf, why: PartitionTableError },
    #[fail(display = "{} is not supported on this device", what)]
    UnsupportedOperation { what: &'static str },
    #[fail(display = "partition {} does not exist", partition)]
    PartitionNotFound { partition: PartitionId },
    #[fail(display = "unable to get mount points: {}", why)]
    MountsObtain { why: io::Error },
    #[fail(display = "unable to mount {:?}: {}", device, why)]
    Mount { device: PathBuf, why: io::Error },
    #[fail(display = "unable to unmount {:?}: {}", device, why)]
    Unmount { device: PathBuf, why: io::Error },
    #[fail(display = "unable to format {:?}: {}", device, why)]
    Format { device: PathBuf, why: io::Error },
}
