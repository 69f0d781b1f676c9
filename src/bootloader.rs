//! Strategies for making the cloned drive bootable.
//!
//! rsync has already copied the bootloader's files by the time a strategy
//! runs; what remains is drive-specific state, like the UUIDs baked into a
//! grub.cfg. Strategies are looked up by the name a user would type.

use crate::{
    cloner::{Cloner, ScopedMount},
    errors::CloneError,
    substitute::multireplace,
};
use disk_types::PartitionId;
use disks::{DiskError, DiskManager};
use std::{
    collections::HashMap,
    fs, io,
    path::Path,
};

/// Which partitions matter to the bootloader. All optional; strategies fall
/// back to searching the target when nothing is specified.
#[derive(Debug, Default, Clone)]
pub struct BootOptions {
    /// Root partition, where the bootloader lives under `/boot`.
    pub root_partition: Option<PartitionId>,
    /// Separate boot partition, when `/boot` is its own filesystem.
    pub boot_partition: Option<PartitionId>,
    /// EFI system partition on UEFI installs.
    pub efi_partition: Option<PartitionId>,
}

pub trait Bootloader {
    fn name(&self) -> &'static str;

    /// Makes the target bootable. Runs after files are copied and fstab has
    /// been rewritten.
    fn install(&self, cloner: &Cloner, options: &BootOptions) -> Result<(), CloneError>;
}

/// Looks a strategy up by name.
pub fn strategy_by_name(name: &str) -> Result<Box<dyn Bootloader>, CloneError> {
    match name {
        "uuid_copy" => Ok(Box::new(UuidCopy)),
        _ => Err(CloneError::UnknownStrategy { name: name.to_owned() }),
    }
}

/// Rewrites drive identifiers inside the target's boot files and changes
/// nothing else. Works for many bootloaders, since the copied installation
/// only differs from a working one by the identifiers it refers to.
pub struct UuidCopy;

/// Configuration files are small; anything bigger than this is a kernel,
/// an initramfs, or something else not worth reading into memory.
const MAX_REWRITE_BYTES: u64 = 200_000_000;

impl Bootloader for UuidCopy {
    fn name(&self) -> &'static str { "uuid_copy" }

    fn install(&self, cloner: &Cloner, options: &BootOptions) -> Result<(), CloneError> {
        let uuid_map = cloner.uuid_map()?;

        match (&options.root_partition, &options.boot_partition) {
            (None, None) => {
                let partition = search_for_boot_part(cloner.target(), "boot", cloner.excluded())?
                    .ok_or_else(|| CloneError::Bootloader {
                        why: io::Error::new(
                            io::ErrorKind::NotFound,
                            format!(
                                "no partition on {} holds a boot folder",
                                cloner.target().device().display()
                            ),
                        ),
                    })?;
                translate_uuids(cloner.target(), &partition, "boot", &uuid_map)?;
            }
            (_, Some(boot)) => translate_uuids(cloner.target(), boot, "", &uuid_map)?,
            (Some(root), None) => translate_uuids(cloner.target(), root, "boot", &uuid_map)?,
        }

        if let Some(efi) = &options.efi_partition {
            translate_uuids(cloner.target(), efi, "", &uuid_map)?;
        }

        Ok(())
    }
}

/// Rewrites identifiers in every text file under `subdir` of the given
/// partition.
fn translate_uuids(
    target: &dyn DiskManager,
    partition: &PartitionId,
    subdir: &str,
    uuid_map: &HashMap<String, String>,
) -> Result<(), CloneError> {
    let mount = ScopedMount::establish(target, partition)?;
    let root = mount.path().join(subdir);
    if !root.is_dir() {
        warn!("partition {} has no {:?} directory to rewrite", partition, subdir);
        return Ok(());
    }

    info!("rewriting identifiers under {} on partition {}", root.display(), partition);
    rewrite_tree(&root, uuid_map).map_err(|why| CloneError::Bootloader { why })
}

fn rewrite_tree(dir: &Path, uuid_map: &HashMap<String, String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let kind = entry.file_type()?;

        if kind.is_dir() {
            rewrite_tree(&path, uuid_map)?;
            continue;
        }

        if !kind.is_file() || entry.metadata()?.len() > MAX_REWRITE_BYTES {
            continue;
        }

        // Binary files fail the UTF-8 read and are skipped.
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => continue,
        };

        let replaced = multireplace(&text, uuid_map);
        if replaced != text {
            debug!("rewrote identifiers in {}", path.display());
            fs::write(&path, replaced)?;
        }
    }

    Ok(())
}

/// Finds the partition carrying the boot files, by mounting each candidate
/// and looking for the named folder at its root or under `boot/`.
fn search_for_boot_part(
    target: &dyn DiskManager,
    folder: &str,
    excluded: &[PartitionId],
) -> Result<Option<PartitionId>, CloneError> {
    for id in target.partitions()? {
        if excluded.contains(&id) {
            continue;
        }

        let mount = match ScopedMount::establish(target, &id) {
            Ok(mount) => mount,
            Err(CloneError::Device { why: DiskError::NotMountable { .. } })
            | Err(CloneError::Device { why: DiskError::Mount { .. } }) => {
                debug!("partition {} not mountable; assumed not to hold the bootloader", id);
                continue;
            }
            Err(why) => return Err(why),
        };

        if mount.path().join(folder).exists() || mount.path().join("boot").join(folder).exists() {
            return Ok(Some(id.clone()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn strategies_resolve_by_name() {
        assert_eq!(strategy_by_name("uuid_copy").unwrap().name(), "uuid_copy");
        match strategy_by_name("grub2-legacy") {
            Err(CloneError::UnknownStrategy { name }) => assert_eq!(name, "grub2-legacy"),
            other => panic!("expected UnknownStrategy, got {:?}", other.map(|s| s.name())),
        }
    }

    #[test]
    fn tree_rewrites_touch_only_matching_files() {
        let dir = TempDir::new("drivesync-test").unwrap();
        let grub = dir.path().join("grub");
        fs::create_dir(&grub).unwrap();
        fs::write(
            grub.join("grub.cfg"),
            "search --fs-uuid f5fa1db1-366f-4a04-b1c6-3935e8717a6b --set=root\n",
        )
        .unwrap();
        fs::write(grub.join("unrelated.cfg"), "set timeout=5\n").unwrap();
        fs::write(grub.join("binary.img"), &[0u8, 159, 146, 150]).unwrap();

        let uuid_map = map(&[(
            "f5fa1db1-366f-4a04-b1c6-3935e8717a6b",
            "9e47a743-69d0-4f18-9a2c-4b57ba55cd6f",
        )]);
        rewrite_tree(dir.path(), &uuid_map).unwrap();

        let rewritten = fs::read_to_string(grub.join("grub.cfg")).unwrap();
        assert_eq!(
            rewritten,
            "search --fs-uuid 9e47a743-69d0-4f18-9a2c-4b57ba55cd6f --set=root\n"
        );
        assert_eq!(fs::read_to_string(grub.join("unrelated.cfg")).unwrap(), "set timeout=5\n");
        assert_eq!(fs::read(grub.join("binary.img")).unwrap(), vec![0u8, 159, 146, 150]);
    }
}
