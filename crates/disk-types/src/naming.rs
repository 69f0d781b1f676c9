use crate::partition::PartitionId;
use std::path::{Path, PathBuf};

/// The two-slot template which maps a device and a partition identifier to
/// the partition's block-special path.
///
/// `/dev/sda` + `1` becomes `/dev/sda1`, `/dev/nvme0n1` + `1` becomes
/// `/dev/nvme0n1p1`, and the volume group `/dev/vg0` + `root` becomes
/// `/dev/vg0/root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNaming {
    device: PathBuf,
    infix: &'static str,
}

impl PartitionNaming {
    /// Naming for an ordinary block device. Devices whose name ends in a
    /// digit (nvme0n1, mmcblk0, loop0, nbd0) take a `p` separator.
    pub fn for_disk<P: AsRef<Path>>(device: P) -> Self {
        let device = device.as_ref().to_path_buf();
        let infix = device
            .file_name()
            .and_then(|name| name.to_str())
            .map_or("", |name| {
                if name.chars().last().map_or(false, |c| c.is_ascii_digit()) {
                    "p"
                } else {
                    ""
                }
            });

        PartitionNaming { device, infix }
    }

    /// Naming for an LVM volume group, whose logical volumes live beneath it.
    pub fn for_volume_group<P: AsRef<Path>>(group: P) -> Self {
        PartitionNaming { device: group.as_ref().to_path_buf(), infix: "/" }
    }

    pub fn device(&self) -> &Path { &self.device }

    /// Resolves the block-special path of the given partition.
    pub fn path_of(&self, id: &PartitionId) -> PathBuf {
        let mut path = self.device.as_os_str().to_os_string();
        path.push(self.infix);
        path.push(id.to_string());
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_naming() {
        let sda = PartitionNaming::for_disk("/dev/sda");
        assert_eq!(sda.path_of(&PartitionId::Number(1)), PathBuf::from("/dev/sda1"));

        let nvme = PartitionNaming::for_disk("/dev/nvme0n1");
        assert_eq!(nvme.path_of(&PartitionId::Number(2)), PathBuf::from("/dev/nvme0n1p2"));
    }

    #[test]
    fn volume_group_naming() {
        let vg = PartitionNaming::for_volume_group("/dev/vg0");
        assert_eq!(vg.path_of(&"root".into()), PathBuf::from("/dev/vg0/root"));
    }
}
