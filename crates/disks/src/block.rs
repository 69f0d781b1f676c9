use crate::{error::DiskError, manager::DiskManager};
use disk_types::{PartitionId, PartitionNaming, PartitionTable};
use external::{
    blockdev_bytes, blockdev_sectors, fdisk_list, partprobe_summary, sfdisk_partition_sectors,
    sgdisk_print, FdiskList, GdiskPrint,
};
use itertools::Itertools;
use std::{io, path::PathBuf};

/// A plain partitioned block device, GPT or MS-DOS.
///
/// The table type is probed on demand so a blank drive can still be opened
/// and sized before a table is ever written to it.
pub struct BlockDevice {
    naming: PartitionNaming,
}

impl BlockDevice {
    pub fn new<P: Into<PathBuf>>(device: P) -> BlockDevice {
        BlockDevice { naming: PartitionNaming::for_disk(device.into()) }
    }

    fn query(&self, why: io::Error) -> DiskError {
        DiskError::Query { device: self.device().to_path_buf(), why }
    }

    fn gdisk(&self) -> Result<GdiskPrint, DiskError> {
        sgdisk_print(self.device()).map_err(|why| self.query(why))
    }

    fn fdisk(&self) -> Result<FdiskList, DiskError> {
        fdisk_list(self.device(), &self.naming).map_err(|why| self.query(why))
    }

    fn number_of(&self, partition: &PartitionId) -> Result<u32, DiskError> {
        partition
            .number()
            .ok_or_else(|| DiskError::PartitionNotFound { partition: partition.clone() })
    }
}

impl DiskManager for BlockDevice {
    fn naming(&self) -> &PartitionNaming { &self.naming }

    fn partitions(&self) -> Result<Vec<PartitionId>, DiskError> {
        match self.table_type()? {
            PartitionTable::Gpt => Ok(self
                .gdisk()?
                .partitions
                .into_iter()
                .sorted_by(|a, b| a.start.cmp(&b.start))
                .into_iter()
                .map(|part| PartitionId::Number(part.num))
                .collect()),
            _ => Ok(self
                .fdisk()?
                .rows
                .into_iter()
                .sorted_by(|a, b| a.start.cmp(&b.start))
                .into_iter()
                .map(|row| PartitionId::Number(row.num))
                .collect()),
        }
    }

    fn table_type(&self) -> Result<PartitionTable, DiskError> {
        let summary = partprobe_summary(self.device()).map_err(|why| self.query(why))?;
        PartitionTable::detect_in(&summary).map_err(|why| DiskError::UnsupportedTable {
            device: self.device().to_path_buf(),
            why,
        })
    }

    fn sectors(&self) -> Result<u64, DiskError> {
        blockdev_sectors(self.device()).map_err(|why| self.query(why))
    }

    fn bytes(&self) -> Result<u64, DiskError> {
        blockdev_bytes(self.device()).map_err(|why| self.query(why))
    }

    fn partition_sectors(&self, partition: &PartitionId) -> Result<u64, DiskError> {
        let num = self.number_of(partition)?;
        match self.table_type()? {
            PartitionTable::Gpt => self
                .gdisk()?
                .partition(num)
                .map(|part| part.sectors())
                .ok_or_else(|| DiskError::PartitionNotFound { partition: partition.clone() }),
            _ => {
                let path = self.partition_path(partition);
                sfdisk_partition_sectors(&path).map_err(|why| self.query(why))
            }
        }
    }

    fn partition_code(&self, partition: &PartitionId) -> Result<String, DiskError> {
        let num = self.number_of(partition)?;
        let code = match self.table_type()? {
            PartitionTable::Gpt => self.gdisk()?.partition(num).map(|part| part.code.clone()),
            _ => self.fdisk()?.row(num).map(|row| row.code.clone()),
        };

        code.ok_or_else(|| DiskError::PartitionNotFound { partition: partition.clone() })
    }

    fn alignment(&self) -> Result<u64, DiskError> {
        match self.table_type() {
            Ok(PartitionTable::Msdos) => Ok(self.fdisk()?.sector_ratio),
            // sgdisk reports the alignment boundary even for a blank disk
            // that is about to receive a GPT layout.
            _ => Ok(self.gdisk()?.alignment),
        }
    }

    fn empty_space(&self) -> Result<u64, DiskError> {
        match self.table_type()? {
            PartitionTable::Gpt => Ok(self.gdisk()?.empty_space()),
            _ => Ok(self.fdisk()?.empty_space()),
        }
    }
}
