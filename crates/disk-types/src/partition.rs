use crate::fs::FileSystem;
use std::fmt;

/// Identifies a partition on a device: ordinary block devices number their
/// partitions, LVM volume groups name their logical volumes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionId {
    Number(u32),
    Name(String),
}

impl PartitionId {
    pub fn number(&self) -> Option<u32> {
        match *self {
            PartitionId::Number(num) => Some(num),
            PartitionId::Name(_) => None,
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PartitionId::Number(num) => write!(f, "{}", num),
            PartitionId::Name(ref name) => f.write_str(name),
        }
    }
}

impl From<u32> for PartitionId {
    fn from(num: u32) -> PartitionId { PartitionId::Number(num) }
}

impl<'a> From<&'a str> for PartitionId {
    fn from(name: &'a str) -> PartitionId { PartitionId::Name(name.into()) }
}

/// A source partition as gathered by the device inspector, in the form the
/// resize planner consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePartition {
    pub id: PartitionId,
    /// Total allocated size, in 512-byte sectors.
    pub size: u64,
    /// Sectors occupied by data; `None` when usage could not be determined,
    /// in which case the partition is treated as fully used.
    pub used: Option<u64>,
    /// The table-specific type code: a GPT code such as `8300`, or an MBR ID
    /// byte such as `83`. Empty for logical volumes.
    pub code: String,
}

/// A partition as seen by the layout validity checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub id: PartitionId,
    pub fs: Option<FileSystem>,
    /// Allocated size in sectors.
    pub size: u64,
    /// Used sectors, or `None` when the partition could not be mounted for a
    /// usage query (swap and friends).
    pub used: Option<u64>,
}
