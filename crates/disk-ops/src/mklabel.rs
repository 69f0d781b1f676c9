use crate::plan::{PlannedSize, ResizePlan};
use disk_types::PartitionNaming;
use external::{
    fdisk_init_dos_label, lvcreate_rest, lvcreate_sectors, render_msdos_script, sfdisk_write,
    sgdisk_randomize, sgdisk_rebuild, sgdisk_zap, MsdosTable,
};
use std::{ffi::OsString, io, path::Path};

/// Wipes the target and rebuilds it from a planned GPT layout in a single
/// `sgdisk` invocation, then randomizes the disk and partition GUIDs so the
/// clone does not collide with its source.
pub fn write_gpt_table(device: &Path, plan: &ResizePlan) -> io::Result<()> {
    info!("rebuilding GPT layout on {}", device.display());
    sgdisk_zap(device)?;

    let mut args: Vec<OsString> = Vec::with_capacity(plan.entries.len() * 4);
    for entry in &plan.entries {
        args.push("-n".into());
        args.push(
            match entry.size {
                PlannedSize::Sectors(sectors) => format!("{}:0:+{}", entry.id, sectors),
                PlannedSize::RestOfDisk => format!("{}:0:0", entry.id),
            }
            .into(),
        );
    }

    for entry in &plan.entries {
        args.push("-t".into());
        args.push(format!("{}:{}", entry.id, entry.code).into());
    }

    sgdisk_rebuild(device, &args)?;
    sgdisk_randomize(device)
}

/// Writes a shrunken MS-DOS table to the target. A fresh DOS label is laid
/// down first so stale entries never survive the rewrite.
pub fn write_msdos_table(
    device: &Path,
    naming: &PartitionNaming,
    table: &MsdosTable,
) -> io::Result<()> {
    info!("rebuilding MS-DOS layout on {}", device.display());
    fdisk_init_dos_label(device)?;

    let script = render_msdos_script(table, naming);
    debug!("proposed table for {}:\n{}", device.display(), script);
    sfdisk_write(device, &script)
}

/// Creates the planned logical volumes inside the target volume group. The
/// caller removes any existing volumes beforehand.
pub fn rebuild_volume_group(group: &Path, plan: &ResizePlan) -> io::Result<()> {
    info!("rebuilding logical volumes in {}", group.display());
    for entry in &plan.entries {
        let name = entry.id.to_string();
        match entry.size {
            PlannedSize::Sectors(sectors) => lvcreate_sectors(group, &name, sectors)?,
            PlannedSize::RestOfDisk => lvcreate_rest(group, &name)?,
        }
    }

    Ok(())
}
