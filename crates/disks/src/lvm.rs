use crate::{error::DiskError, manager::DiskManager};
use disk_types::{PartitionId, PartitionNaming, PartitionTable, SourcePartition};
use external::{
    lvdisplay_sectors, lvremove, lvs_names, mapper_fragment, vgs_bytes, vgs_free_sectors,
    vgs_sectors,
};
use std::{
    io,
    path::{Path, PathBuf},
};

/// An LVM volume group, treated as a drive whose partitions are its
/// logical volumes.
pub struct LvmVolumeGroup {
    naming: PartitionNaming,
    name: String,
}

impl LvmVolumeGroup {
    pub fn new(name: &str) -> LvmVolumeGroup {
        LvmVolumeGroup {
            naming: PartitionNaming::for_volume_group(Path::new("/dev").join(name)),
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    fn query(&self, why: io::Error) -> DiskError {
        DiskError::Query { device: self.device().to_path_buf(), why }
    }

    /// Removes every logical volume in the group, so the group can be
    /// rebuilt from a plan.
    pub fn remove_volumes(&self) -> Result<(), DiskError> {
        for volume in self.partitions()? {
            self.unmount(&volume)?;
            debug!("removing logical volume {}", volume);
            lvremove(self.naming.path_of(&volume)).map_err(|why| self.query(why))?;
        }

        Ok(())
    }
}

impl DiskManager for LvmVolumeGroup {
    fn naming(&self) -> &PartitionNaming { &self.naming }

    fn partitions(&self) -> Result<Vec<PartitionId>, DiskError> {
        let names = lvs_names(&self.name).map_err(|why| self.query(why))?;
        Ok(names.into_iter().map(PartitionId::Name).collect())
    }

    fn table_type(&self) -> Result<PartitionTable, DiskError> { Ok(PartitionTable::Lvm) }

    fn sectors(&self) -> Result<u64, DiskError> {
        vgs_sectors(self.device()).map_err(|why| self.query(why))
    }

    fn bytes(&self) -> Result<u64, DiskError> {
        vgs_bytes(self.device()).map_err(|why| self.query(why))
    }

    fn partition_sectors(&self, partition: &PartitionId) -> Result<u64, DiskError> {
        lvdisplay_sectors(self.naming.path_of(partition)).map_err(|why| self.query(why))
    }

    fn partition_code(&self, _partition: &PartitionId) -> Result<String, DiskError> {
        Err(DiskError::UnsupportedOperation { what: "partition type codes" })
    }

    fn alignment(&self) -> Result<u64, DiskError> {
        Err(DiskError::UnsupportedOperation { what: "partition alignment" })
    }

    fn empty_space(&self) -> Result<u64, DiskError> {
        vgs_free_sectors(self.device()).map_err(|why| self.query(why))
    }

    /// Filesystems on logical volumes are found through their
    /// device-mapper nodes, which is how `/proc/mounts` and `df` name them.
    fn partition_path(&self, partition: &PartitionId) -> PathBuf {
        PathBuf::from("/dev/mapper").join(mapper_fragment(&self.name, &partition.to_string()))
    }

    fn source_partitions(&self) -> Result<Vec<SourcePartition>, DiskError> {
        let mut parts = Vec::new();
        for id in self.partitions()? {
            let size = self.partition_sectors(&id)?;
            let used = self.usage_of(&id);
            // Logical volumes carry no type code.
            parts.push(SourcePartition { id, size, used, code: String::new() });
        }

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_volumes_resolve_to_mapper_nodes() {
        let group = LvmVolumeGroup::new("my-vg");
        assert_eq!(
            group.partition_path(&PartitionId::Name("swap-1".into())),
            PathBuf::from("/dev/mapper/my--vg-swap--1")
        );
    }

    #[test]
    fn volume_group_device_lives_under_dev() {
        let group = LvmVolumeGroup::new("vg0");
        assert_eq!(group.device(), Path::new("/dev/vg0"));
        assert_eq!(
            group.naming().path_of(&PartitionId::Name("root".into())),
            PathBuf::from("/dev/vg0/root")
        );
    }
}
