use crate::{error::DiskError, usage::used_sectors};
use disk_types::{
    FileSystem, LayoutEntry, PartitionId, PartitionNaming, PartitionTable, SourcePartition,
};
use external::{blkid_fs, mkfs};
use partition_identity::PartitionID;
use proc_mounts::MountList;
use std::io;
use std::path::{Path, PathBuf};
use sys_mount::{unmount, Mount, MountFlags, UnmountFlags};

/// A drive taking part in a clone, asked about through the same tools an
/// administrator would run by hand.
///
/// Plain disks and LVM volume groups both implement this, so the planner
/// and the copier never care which kind of device they are working with.
pub trait DiskManager {
    /// Naming scheme for the device's partition nodes.
    fn naming(&self) -> &PartitionNaming;

    /// The disk or volume group device itself.
    fn device(&self) -> &Path { self.naming().device() }

    /// Partition identifiers in on-disk order.
    fn partitions(&self) -> Result<Vec<PartitionId>, DiskError>;

    fn table_type(&self) -> Result<PartitionTable, DiskError>;

    /// Total size of the device in 512-byte sectors.
    fn sectors(&self) -> Result<u64, DiskError>;

    /// Total size of the device in bytes.
    fn bytes(&self) -> Result<u64, DiskError>;

    fn partition_sectors(&self, partition: &PartitionId) -> Result<u64, DiskError>;

    /// Type code of a partition as its table's tooling reports it.
    fn partition_code(&self, partition: &PartitionId) -> Result<String, DiskError>;

    /// Sector alignment that new partitions must honor.
    fn alignment(&self) -> Result<u64, DiskError>;

    /// Unclaimed sectors after the last partition.
    fn empty_space(&self) -> Result<u64, DiskError>;

    /// Device node a partition's filesystem lives on.
    fn partition_path(&self, partition: &PartitionId) -> PathBuf {
        self.naming().path_of(partition)
    }

    fn partition_fs(&self, partition: &PartitionId) -> Result<Option<FileSystem>, DiskError> {
        let path = self.partition_path(partition);
        blkid_fs(&path).map_err(|why| DiskError::Query { device: path, why })
    }

    /// Used sectors of a partition's filesystem, measured with `df`.
    fn partition_used(&self, partition: &PartitionId) -> Result<u64, DiskError> {
        let fs = self.partition_fs(partition)?;
        used_sectors(&self.partition_path(partition), fs)
    }

    /// Where a partition is currently mounted, if anywhere.
    fn mount_point(&self, partition: &PartitionId) -> Result<Option<PathBuf>, DiskError> {
        let mounts = MountList::new().map_err(|why| DiskError::MountsObtain { why })?;
        Ok(mounts
            .get_mount_by_source(&self.partition_path(partition))
            .map(|mount| mount.dest.clone()))
    }

    fn mount(&self, partition: &PartitionId, target: &Path) -> Result<(), DiskError> {
        let path = self.partition_path(partition);
        match self.partition_fs(partition)? {
            Some(fs) if fs.is_mountable() => {
                Mount::new(&path, target, fs, MountFlags::empty(), None)
                    .map(drop)
                    .map_err(|why| DiskError::Mount { device: path, why })
            }
            _ => Err(DiskError::NotMountable { device: path }),
        }
    }

    fn unmount(&self, partition: &PartitionId) -> Result<(), DiskError> {
        if let Some(point) = self.mount_point(partition)? {
            unmount(&point, UnmountFlags::empty()).map_err(|why| DiskError::Unmount {
                device: self.partition_path(partition),
                why,
            })?;
        }

        Ok(())
    }

    /// Writes a new filesystem to the device node.
    fn create_fs(&self, path: &Path, fs: FileSystem) -> io::Result<()> { mkfs(path, fs) }

    /// Creates a filesystem on a partition. A mounted partition is unmounted
    /// first and mounted back at the same place afterwards, whether or not
    /// the format went through.
    fn format_partition(&self, partition: &PartitionId, fs: FileSystem) -> Result<(), DiskError> {
        let restore = self.mount_point(partition)?;
        self.unmount(partition)?;

        let path = self.partition_path(partition);
        let formatted = self.create_fs(&path, fs);

        if let Some(point) = restore {
            self.mount(partition, &point)?;
        }

        formatted.map_err(|why| DiskError::Format { device: path, why })
    }

    fn partition_uuid(&self, partition: &PartitionId) -> Option<String> {
        PartitionID::get_uuid(self.partition_path(partition)).map(|id| id.id)
    }

    fn partition_partuuid(&self, partition: &PartitionId) -> Option<String> {
        PartitionID::get_partuuid(self.partition_path(partition)).map(|id| id.id)
    }

    /// Layout summary for compatibility checks. Usage stays `None` when a
    /// filesystem cannot be inspected.
    fn layout(&self) -> Result<Vec<LayoutEntry>, DiskError> {
        let mut entries = Vec::new();
        for id in self.partitions()? {
            let fs = self.partition_fs(&id)?;
            let size = self.partition_sectors(&id)?;
            let used = self.usage_of(&id);
            entries.push(LayoutEntry { id, fs, size, used });
        }

        Ok(entries)
    }

    /// Everything the resize planner needs to know about each partition.
    fn source_partitions(&self) -> Result<Vec<SourcePartition>, DiskError> {
        let mut parts = Vec::new();
        for id in self.partitions()? {
            let size = self.partition_sectors(&id)?;
            let code = self.partition_code(&id)?;
            let used = self.usage_of(&id);
            parts.push(SourcePartition { id, size, used, code });
        }

        Ok(parts)
    }

    /// Best-effort usage: anything that stops `df` from answering demotes
    /// the figure to unknown rather than failing the whole inspection.
    fn usage_of(&self, partition: &PartitionId) -> Option<u64> {
        match self.partition_used(partition) {
            Ok(used) => Some(used),
            Err(DiskError::NotMountable { device }) => {
                debug!("{} holds no mountable filesystem", device.display());
                None
            }
            Err(why) => {
                warn!("unable to measure usage of {}: {}", partition, why);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeDisk {
        naming: PartitionNaming,
        mounted_at: RefCell<Option<PathBuf>>,
        events: RefCell<Vec<String>>,
        fail_format: bool,
    }

    impl FakeDisk {
        fn mounted(fail_format: bool) -> FakeDisk {
            FakeDisk {
                naming: PartitionNaming::for_disk("/dev/fake"),
                mounted_at: RefCell::new(Some(PathBuf::from("/mnt/data"))),
                events: RefCell::new(Vec::new()),
                fail_format,
            }
        }
    }

    impl DiskManager for FakeDisk {
        fn naming(&self) -> &PartitionNaming { &self.naming }

        fn partitions(&self) -> Result<Vec<PartitionId>, DiskError> {
            Ok(vec![PartitionId::Number(1)])
        }

        fn table_type(&self) -> Result<PartitionTable, DiskError> { Ok(PartitionTable::Gpt) }

        fn sectors(&self) -> Result<u64, DiskError> { Ok(16_777_216) }

        fn bytes(&self) -> Result<u64, DiskError> { Ok(16_777_216 * 512) }

        fn partition_sectors(&self, _: &PartitionId) -> Result<u64, DiskError> {
            Ok(1_048_576)
        }

        fn partition_code(&self, _: &PartitionId) -> Result<String, DiskError> {
            Ok("8300".into())
        }

        fn alignment(&self) -> Result<u64, DiskError> { Ok(2048) }

        fn empty_space(&self) -> Result<u64, DiskError> { Ok(34) }

        fn mount_point(&self, _: &PartitionId) -> Result<Option<PathBuf>, DiskError> {
            Ok(self.mounted_at.borrow().clone())
        }

        fn mount(&self, _: &PartitionId, target: &Path) -> Result<(), DiskError> {
            self.events.borrow_mut().push(format!("mount {}", target.display()));
            self.mounted_at.replace(Some(target.to_path_buf()));
            Ok(())
        }

        fn unmount(&self, _: &PartitionId) -> Result<(), DiskError> {
            self.events.borrow_mut().push("unmount".into());
            self.mounted_at.replace(None);
            Ok(())
        }

        fn create_fs(&self, _: &Path, _: FileSystem) -> io::Result<()> {
            self.events.borrow_mut().push("mkfs".into());
            if self.fail_format {
                Err(io::Error::new(io::ErrorKind::Other, "mkfs refused the device"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn formatting_restores_a_preexisting_mount() {
        let disk = FakeDisk::mounted(false);
        disk.format_partition(&PartitionId::Number(1), FileSystem::Ext4).unwrap();

        assert_eq!(disk.mounted_at.borrow().as_deref(), Some(Path::new("/mnt/data")));
        assert_eq!(*disk.events.borrow(), vec!["unmount", "mkfs", "mount /mnt/data"]);
    }

    #[test]
    fn failed_formats_still_restore_the_mount() {
        let disk = FakeDisk::mounted(true);
        let outcome = disk.format_partition(&PartitionId::Number(1), FileSystem::Ext4);

        match outcome {
            Err(DiskError::Format { .. }) => (),
            other => panic!("expected Format error, got {:?}", other),
        }
        assert_eq!(disk.mounted_at.borrow().as_deref(), Some(Path::new("/mnt/data")));
        assert_eq!(*disk.events.borrow(), vec!["unmount", "mkfs", "mount /mnt/data"]);
    }
}
