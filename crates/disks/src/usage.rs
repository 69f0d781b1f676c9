use crate::error::DiskError;
use disk_types::FileSystem;
use proc_mounts::MountList;
use std::path::Path;
use sys_mount::{Mount, MountFlags, Unmount, UnmountFlags};
use tempdir::TempDir;

/// Used sectors of the filesystem on `device`, measured with `df`.
///
/// A mounted filesystem is measured in place. An unmounted one is mounted
/// read-only on a scratch directory for the duration of the call and
/// detached again afterwards, leaving the system as it was found.
pub(crate) fn used_sectors(device: &Path, fs: Option<FileSystem>) -> Result<u64, DiskError> {
    let fs = match fs {
        Some(fs) if fs.is_mountable() => fs,
        _ => return Err(DiskError::NotMountable { device: device.to_path_buf() }),
    };

    let mounts = MountList::new().map_err(|why| DiskError::MountsObtain { why })?;
    if mounts.get_mount_by_source(device).is_some() {
        return df(device);
    }

    let scratch = TempDir::new("drivesync")
        .map_err(|why| DiskError::Query { device: device.to_path_buf(), why })?;

    debug!("mounting {} at {} to measure usage", device.display(), scratch.path().display());
    let mount = Mount::new(device, scratch.path(), fs, MountFlags::RDONLY, None).map_err(
        |why| match why.raw_os_error() {
            // The kernel rejects filesystems it cannot interpret with
            // EINVAL or ENODEV rather than anything more descriptive.
            Some(libc::EINVAL) | Some(libc::ENODEV) => {
                DiskError::NotMountable { device: device.to_path_buf() }
            }
            _ => DiskError::Mount { device: device.to_path_buf(), why },
        },
    )?;

    let _detach = mount.into_unmount_drop(UnmountFlags::DETACH);
    df(device)
}

fn df(device: &Path) -> Result<u64, DiskError> {
    external::df_used_sectors(device)
        .map_err(|why| DiskError::Query { device: device.to_path_buf(), why })
}
