use super::{block::parse_u64, exec, exec_with_output};
use std::{ffi::OsString, io, path::Path};

/// A partition row from `sgdisk --print`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdiskPartition {
    pub num: u32,
    pub start: u64,
    pub end: u64,
    pub code: String,
}

impl GdiskPartition {
    /// Allocated size in sectors.
    pub fn sectors(&self) -> u64 { self.end - self.start }
}

/// The state of a GPT disk as reported by `sgdisk --print`, with partitions
/// held in on-disk order (sorted by start sector, not table-slot order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdiskPrint {
    pub total_sectors: u64,
    /// Sector granularity that new partitions must be aligned on.
    pub alignment: u64,
    pub partitions: Vec<GdiskPartition>,
}

impl GdiskPrint {
    /// Sectors free after the final on-disk partition. Gaps between
    /// partitions are not counted.
    pub fn empty_space(&self) -> u64 {
        match self.partitions.last() {
            Some(last) => self.total_sectors.saturating_sub(last.end),
            None => self.total_sectors,
        }
    }

    pub fn partition(&self, num: u32) -> Option<&GdiskPartition> {
        self.partitions.iter().find(|part| part.num == num)
    }
}

/// Queries a GPT device via `sgdisk <device> -p`.
pub fn sgdisk_print<P: AsRef<Path>>(device: P) -> io::Result<GdiskPrint> {
    let output = exec_with_output("sgdisk", None, None, &[device.as_ref().into(), "-p".into()])?;
    parse_gdisk_print(&output)
}

/// Erases the partition table (and backup table) on the device.
pub fn sgdisk_zap<P: AsRef<Path>>(device: P) -> io::Result<()> {
    exec("sgdisk", None, None, &[device.as_ref().into(), "-Z".into()])
}

/// Builds a fresh table in a single invocation: `-o` clears, then each
/// partition is created (`-n`) and typed (`-t`) in order.
pub fn sgdisk_rebuild<P: AsRef<Path>>(device: P, args: &[OsString]) -> io::Result<()> {
    let mut full: Vec<OsString> = vec![device.as_ref().into(), "-o".into()];
    full.extend_from_slice(args);
    exec("sgdisk", None, None, &full)
}

/// Randomizes the disk and partition GUIDs, so a cloned table never shares
/// identity with its source.
pub fn sgdisk_randomize<P: AsRef<Path>>(device: P) -> io::Result<()> {
    exec("sgdisk", None, None, &[device.as_ref().into(), "-G".into()])
}

fn parse_gdisk_print(output: &str) -> io::Result<GdiskPrint> {
    let mut total_sectors = None;
    let mut alignment = None;
    let mut partitions = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("Disk ") && line.contains("sectors") {
            // "Disk /dev/sda: 1000215216 sectors, 476.9 GiB"
            total_sectors = line.split_whitespace().find_map(|word| word.parse::<u64>().ok());
        } else if let Some(rest) = line.strip_prefix("Partitions will be aligned on ") {
            // "... aligned on 2048-sector boundaries"
            alignment = rest.split('-').next().and_then(|value| value.parse::<u64>().ok());
        } else {
            let mut words = line.split_whitespace();
            let num = match words.next().and_then(|w| w.parse::<u32>().ok()) {
                Some(num) => num,
                None => continue,
            };

            // Columns: number, start, end, size value, size unit, code, name.
            let start = words.next().map(parse_u64).transpose()?;
            let end = words.next().map(parse_u64).transpose()?;
            let code = words.nth(2);
            match (start, end, code) {
                (Some(start), Some(end), Some(code)) => {
                    partitions.push(GdiskPartition { num, start, end, code: code.into() })
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("malformed sgdisk partition row: '{}'", line),
                    ))
                }
            }
        }
    }

    let total_sectors = total_sectors
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sgdisk output lacks disk size"))?;
    let alignment = alignment
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sgdisk output lacks alignment"))?;

    partitions.sort_by(|a, b| a.start.cmp(&b.start));
    Ok(GdiskPrint { total_sectors, alignment, partitions })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGDISK_INPUT: &str = r#"Disk /dev/sda: 16777216 sectors, 8.0 GiB
Logical sector size: 512 bytes
Disk identifier (GUID): 15FB7A95-BE0A-4F5F-A7DD-BBFB0964BDB0
Partition table holds up to 128 entries
First usable sector is 34, last usable sector is 16777182
Partitions will be aligned on 2048-sector boundaries
Total free space is 4029 sectors (2.0 MiB)

Number  Start (sector)    End (sector)  Size       Code  Name
   1            2048         1026047   500.0 MiB   EF00  EFI System
   2         1026048        12290047   5.4 GiB     8300
   3        12290048        15157247   1.4 GiB     8300  Linux filesystem
   4        15157248        16775167   790.0 MiB   8200
"#;

    // Table-slot order deliberately differs from on-disk order here: slot 4
    // starts before slot 1.
    const SGDISK_SHUFFLED: &str = r#"Disk /dev/sdb: 1000000 sectors, 488.3 MiB
Logical sector size: 512 bytes
Disk identifier (GUID): 1E15A1E3-0ECB-4286-8D44-A40A1E6DE2A9
Partition table holds up to 128 entries
First usable sector is 34, last usable sector is 999966
Partitions will be aligned on 2048-sector boundaries
Total free space is 2014 sectors (1007.0 KiB)

Number  Start (sector)    End (sector)  Size       Code  Name
   1          500000          700000    97.7 MiB   8300
   2          700001          800000    48.8 MiB   8300
   3          800001          999966    97.6 MiB   8300
   4            2048          499999   243.1 MiB   8300
"#;

    #[test]
    fn gdisk_print_parsing() {
        let print = parse_gdisk_print(SGDISK_INPUT).unwrap();
        assert_eq!(print.total_sectors, 16_777_216);
        assert_eq!(print.alignment, 2048);
        assert_eq!(print.partitions.len(), 4);
        assert_eq!(print.partitions[0].code, "EF00");
        assert_eq!(print.partition(2).unwrap().sectors(), 11_263_999);
        assert_eq!(print.empty_space(), 16_777_216 - 16_775_167);
    }

    #[test]
    fn gdisk_rows_in_disk_order() {
        let print = parse_gdisk_print(SGDISK_SHUFFLED).unwrap();
        let order: Vec<u32> = print.partitions.iter().map(|p| p.num).collect();
        assert_eq!(order, vec![4, 1, 2, 3]);
        assert_eq!(print.empty_space(), 1_000_000 - 999_966);
    }

    #[test]
    fn gdisk_print_requires_alignment() {
        assert!(parse_gdisk_print("Disk /dev/sda: 1000 sectors, 1 MiB").is_err());
    }
}
