/// Specifies the partition table found on a device. Volume groups report a
/// synthetic `Lvm` table, as logical volumes carry no real table.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PartitionTable {
    Gpt,
    Msdos,
    Lvm,
}

/// A possible error when probing the partition table.
#[derive(Debug, Fail, PartialEq)]
pub enum PartitionTableError {
    #[fail(display = "partition table type of {} is not supported", _0)]
    Unsupported(String),
    #[fail(display = "partition table not found")]
    NotFound,
}

impl PartitionTable {
    /// Scans tool output (`partprobe -d -s`) for a supported table name.
    pub fn detect_in(output: &str) -> Result<PartitionTable, PartitionTableError> {
        if output.contains("gpt") {
            Ok(PartitionTable::Gpt)
        } else if output.contains("msdos") || output.contains("dos") {
            Ok(PartitionTable::Msdos)
        } else {
            Err(PartitionTableError::Unsupported(output.trim().into()))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PartitionTable::Gpt => "gpt",
            PartitionTable::Msdos => "msdos",
            PartitionTable::Lvm => "lvm",
        }
    }
}
