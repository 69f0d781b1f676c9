use super::{block::parse_u64, exec, exec_with_output};
use std::{io, path::Path};

/// Names of the logical volumes belonging to `group`, from `lvs`.
pub fn lvs_names(group: &str) -> io::Result<Vec<String>> {
    info!("obtaining logical volumes on {}", group);
    let output = exec_with_output(
        "lvs",
        None,
        None,
        &["--separator".into(), ":".into(), "--noheadings".into()],
    )?;

    let mut volumes = Vec::new();
    for line in output.lines() {
        let mut fields = line.trim().split(':');
        if let (Some(lv), Some(vg)) = (fields.next(), fields.next()) {
            if vg == group {
                volumes.push(lv.into());
            }
        }
    }

    Ok(volumes)
}

/// Volume group size via `vgs --units`. The trailing unit character on the
/// reported value is stripped.
fn vgs_field(group: &Path, field: &'static str) -> io::Result<u64> {
    let output = exec_with_output(
        "vgs",
        None,
        None,
        &[
            "--units".into(),
            "s".into(),
            "-o".into(),
            field.into(),
            "--noheadings".into(),
            group.into(),
        ],
    )?;

    let value = output.trim();
    parse_u64(value.trim_end_matches(|c: char| !c.is_ascii_digit()))
}

/// Total size of the volume group in 512-byte sectors.
pub fn vgs_sectors(group: &Path) -> io::Result<u64> { vgs_field(group, "size") }

/// Unallocated space in the volume group in 512-byte sectors.
pub fn vgs_free_sectors(group: &Path) -> io::Result<u64> { vgs_field(group, "free") }

/// Total size of the volume group in bytes.
pub fn vgs_bytes(group: &Path) -> io::Result<u64> {
    let output = exec_with_output(
        "vgs",
        None,
        None,
        &[
            "--units".into(),
            "b".into(),
            "-o".into(),
            "size".into(),
            "--noheadings".into(),
            group.into(),
        ],
    )?;

    let value = output.trim();
    parse_u64(value.trim_end_matches(|c: char| !c.is_ascii_digit()))
}

/// Size of a logical volume in 512-byte sectors, from the colon-separated
/// `lvdisplay -c` record (field 7).
pub fn lvdisplay_sectors<P: AsRef<Path>>(volume: P) -> io::Result<u64> {
    let output =
        exec_with_output("lvdisplay", None, None, &["-c".into(), volume.as_ref().into()])?;
    parse_lvdisplay_sectors(&output)
}

fn parse_lvdisplay_sectors(output: &str) -> io::Result<u64> {
    output
        .trim()
        .split(':')
        .nth(6)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "short lvdisplay record"))
        .and_then(parse_u64)
}

/// Creates a logical volume with an exact size in sectors.
pub fn lvcreate_sectors(group: &Path, name: &str, sectors: u64) -> io::Result<()> {
    exec(
        "lvcreate",
        None,
        None,
        &[
            "--size".into(),
            format!("{}S", sectors).into(),
            "-n".into(),
            name.into(),
            group.into(),
        ],
    )
}

/// Creates a logical volume occupying all remaining free space.
pub fn lvcreate_rest(group: &Path, name: &str) -> io::Result<()> {
    exec(
        "lvcreate",
        None,
        None,
        &["-l".into(), "100%FREE".into(), "-n".into(), name.into(), group.into()],
    )
}

/// Removes the logical volume at the given path without prompting.
pub fn lvremove<P: AsRef<Path>>(volume: P) -> io::Result<()> {
    exec("lvremove", None, None, &["-f".into(), volume.as_ref().into()])
}

/// The device-mapper fragment for a logical volume: dashes in the group name
/// are doubled, as in `/dev/mapper/my--vg-root`.
pub fn mapper_fragment(group_name: &str, volume: &str) -> String {
    format!("{}-{}", group_name.replace('-', "--"), volume.replace('-', "--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lvdisplay_record() {
        let record = "  /dev/vg0/root:vg0:3:1:-1:1:4194304:512:-1:0:-1:254:0\n";
        assert_eq!(parse_lvdisplay_sectors(record).unwrap(), 4_194_304);
    }

    #[test]
    fn mapper_fragments_double_dashes() {
        assert_eq!(mapper_fragment("vg0", "root"), "vg0-root");
        assert_eq!(mapper_fragment("my-vg", "swap-1"), "my--vg-swap--1");
    }
}
