use self::FileSystem::*;
use super::{exec, exec_with_output};
use disk_types::FileSystem;
use std::{ffi::OsString, io, path::Path};

/// Total size of the device in 512-byte sectors, via `blockdev --getsz`.
pub fn blockdev_sectors<P: AsRef<Path>>(device: P) -> io::Result<u64> {
    exec_with_output("blockdev", None, None, &["--getsz".into(), device.as_ref().into()])
        .and_then(|out| parse_u64(out.trim()))
}

/// Total size of the device in bytes, via `blockdev --getsize64`.
pub fn blockdev_bytes<P: AsRef<Path>>(device: P) -> io::Result<u64> {
    exec_with_output("blockdev", None, None, &["--getsize64".into(), device.as_ref().into()])
        .and_then(|out| parse_u64(out.trim()))
}

/// Forces the kernel to re-read the partition table after a rewrite. A
/// failure here means the kernel's partition mappings are stale, which would
/// silently corrupt any subsequent copy, so callers must treat it as fatal.
pub fn partprobe<P: AsRef<Path>>(device: P) -> io::Result<()> {
    exec("partprobe", None, None, &[device.as_ref().into()])
}

/// Reports the partition table without updating the kernel, via
/// `partprobe -d -s`. The output names the table type.
pub fn partprobe_summary<P: AsRef<Path>>(device: P) -> io::Result<String> {
    exec_with_output("partprobe", None, None, &["-d".into(), "-s".into(), device.as_ref().into()])
}

/// Obtains the file system on a partition via blkid. Unrecognized or absent
/// file systems yield `None`; only a genuine tool failure is an error.
pub fn blkid_fs<P: AsRef<Path>>(part: P) -> io::Result<Option<FileSystem>> {
    // blkid exits 2 when the partition holds nothing it recognizes.
    let output = exec_with_output(
        "blkid",
        None,
        Some(&[2]),
        &["-o".into(), "value".into(), "-s".into(), "TYPE".into(), part.as_ref().into()],
    )?;

    Ok(output.trim().parse::<FileSystem>().ok())
}

/// Space consumed on a mounted partition, in 512-byte sectors, from
/// `df --block-size=512`. The partition must be mounted; `source` is matched
/// against df's file system column.
pub fn df_used_sectors<P: AsRef<Path>>(source: P) -> io::Result<u64> {
    let output =
        exec_with_output("df", None, None, &["--block-size=512".into(), "-P".into()])?;
    parse_df_used(&output, source.as_ref())
}

fn parse_df_used(output: &str, source: &Path) -> io::Result<u64> {
    for line in output.lines().skip(1) {
        let mut fields = line.split_whitespace();
        if fields.next() == source.to_str() {
            // Columns: Filesystem, 512-blocks, Used, Available, Use%, Mount.
            return match fields.nth(1) {
                Some(used) => parse_u64(used),
                None => Err(io::Error::new(io::ErrorKind::Other, "malformed df row")),
            };
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not present in df output", source.display()),
    ))
}

/// Formats the supplied `part` device with the file system specified.
pub fn mkfs<P: AsRef<Path>>(part: P, kind: FileSystem) -> io::Result<()> {
    let (cmd, args): (&'static str, &'static [&'static str]) = match kind {
        Btrfs => ("mkfs.btrfs", &["-f"]),
        Exfat => ("mkfs.exfat", &[]),
        Ext2 => ("mkfs.ext2", &["-F", "-q"]),
        Ext3 => ("mkfs.ext3", &["-F", "-q"]),
        Ext4 => ("mkfs.ext4", &["-F", "-q"]),
        F2fs => ("mkfs.f2fs", &["-f", "-q"]),
        Fat16 => ("mkfs.fat", &["-F", "16"]),
        Fat32 => ("mkfs.fat", &["-F", "32"]),
        Ntfs => ("mkfs.ntfs", &["-FQ", "-q"]),
        Swap => ("mkswap", &["-f"]),
        Xfs => ("mkfs.xfs", &["-f"]),
        // Containers are recreated by their own tooling, not mkfs.
        Luks | Lvm => return Ok(()),
    };

    exec(cmd, None, None, &{
        let mut args = args.iter().map(Into::into).collect::<Vec<OsString>>();
        args.push(part.as_ref().into());
        args
    })
}

pub(crate) fn parse_u64(value: &str) -> io::Result<u64> {
    value.parse::<u64>().map_err(|_| {
        io::Error::new(io::ErrorKind::Other, format!("expected an integer, found '{}'", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF_INPUT: &str = r#"Filesystem     512-blocks      Used Available Capacity Mounted on
udev             16192048         0  16192048       0% /dev
tmpfs             3244848      3768   3241080       1% /run
/dev/sda2       959110648 275786936 634520656      31% /
/dev/sda1         1046520     21544   1024976       3% /boot/efi
/dev/sdb1         2086912    425984   1660928      21% /mnt/sync-target
"#;

    #[test]
    fn df_used() {
        assert_eq!(parse_df_used(DF_INPUT, Path::new("/dev/sda2")).unwrap(), 275_786_936);
        assert_eq!(parse_df_used(DF_INPUT, Path::new("/dev/sdb1")).unwrap(), 425_984);
    }

    #[test]
    fn df_not_mounted() {
        let err = parse_df_used(DF_INPUT, Path::new("/dev/sdc1")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
