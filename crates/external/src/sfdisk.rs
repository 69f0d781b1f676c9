use super::{block::parse_u64, exec, exec_with_output};
use disk_types::{PartitionId, PartitionNaming};
use std::{fmt::Write as _, io, path::Path};

/// One partition line from an `sfdisk --dump` table description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsdosEntry {
    pub num: u32,
    pub start: u64,
    pub size: u64,
    /// MBR ID byte in hex, e.g. `83` or `5`.
    pub code: String,
    pub bootable: bool,
}

impl MsdosEntry {
    /// Extended partitions act as containers for logical partitions. sfdisk
    /// reports them as `5`, `f` (W95 extended LBA), or `85` (Linux extended).
    pub fn is_extended(&self) -> bool {
        matches!(self.code.as_str(), "5" | "f" | "85" | "05" | "0f")
    }
}

/// A parsed `sfdisk --dump`, preserving the key sfdisk used for the ID field
/// so the rendered script matches the dialect of the local tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsdosTable {
    pub entries: Vec<MsdosEntry>,
    /// `type` on current sfdisk, `Id` on older releases.
    pub id_key: String,
}

/// Reads the source device's table description via `sfdisk --dump`.
pub fn sfdisk_dump<P: AsRef<Path>>(device: P, naming: &PartitionNaming) -> io::Result<MsdosTable> {
    let output = exec_with_output("sfdisk", None, None, &["-d".into(), device.as_ref().into()])?;
    parse_sfdisk_dump(&output, naming)
}

/// Size of a single partition in 512-byte sectors. `sfdisk -s` reports
/// 1024-byte blocks, which are converted here.
pub fn sfdisk_partition_sectors<P: AsRef<Path>>(part: P) -> io::Result<u64> {
    exec_with_output("sfdisk", None, None, &["-s".into(), part.as_ref().into()])
        .and_then(|out| parse_u64(out.trim()))
        .map(|blocks| blocks * 2)
}

/// Initializes an empty DOS label on the device by scripting fdisk, exactly
/// as a user typing `o`, `w`, `q` would.
pub fn fdisk_init_dos_label<P: AsRef<Path>>(device: P) -> io::Result<()> {
    exec("fdisk", Some(b"o\nw\nq\n"), Some(&[1]), &[device.as_ref().into()])
}

/// Feeds a sector-addressed table description to `sfdisk --force`.
pub fn sfdisk_write<P: AsRef<Path>>(device: P, script: &str) -> io::Result<()> {
    exec("sfdisk", Some(script.as_bytes()), None, &["--force".into(), device.as_ref().into()])
}

/// Renders entries back into the script format `sfdisk` consumes, in
/// partition-number order.
pub fn render_msdos_script(table: &MsdosTable, naming: &PartitionNaming) -> String {
    let mut entries: Vec<&MsdosEntry> = table.entries.iter().collect();
    entries.sort_by(|a, b| a.num.cmp(&b.num));

    let mut script = String::from("unit: sectors\n\n");
    for entry in entries {
        let path = naming.path_of(&PartitionId::Number(entry.num));
        let _ = writeln!(
            script,
            "{} : start= {}, size= {}, {}= {}{}",
            path.display(),
            entry.start,
            entry.size,
            table.id_key,
            entry.code,
            if entry.bootable { ", bootable" } else { "" },
        );
    }

    script
}

fn parse_sfdisk_dump(output: &str, naming: &PartitionNaming) -> io::Result<MsdosTable> {
    let mut entries = Vec::new();
    let mut id_key = String::from("type");

    for line in output.lines() {
        let (device, fields) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        let num = match partition_number(device.trim(), naming) {
            Some(num) => num,
            None => continue,
        };

        let mut start = None;
        let mut size = None;
        let mut code = None;
        let mut bootable = false;

        for field in fields.split(',') {
            match field.split_once('=') {
                Some((key, value)) => {
                    let (key, value) = (key.trim(), value.trim());
                    match key {
                        "start" => start = Some(parse_u64(value)?),
                        "size" => size = Some(parse_u64(value)?),
                        "type" | "Id" => {
                            id_key = key.into();
                            code = Some(value.to_owned());
                        }
                        _ => (),
                    }
                }
                None => {
                    if field.trim() == "bootable" || field.trim() == "*" {
                        bootable = true;
                    }
                }
            }
        }

        match (start, size, code) {
            (Some(start), Some(size), Some(code)) => {
                entries.push(MsdosEntry { num, start, size, code, bootable })
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("malformed sfdisk dump line: '{}'", line),
                ))
            }
        }
    }

    entries.sort_by(|a, b| a.start.cmp(&b.start));
    Ok(MsdosTable { entries, id_key })
}

fn partition_number(device: &str, naming: &PartitionNaming) -> Option<u32> {
    let prefix = naming.path_of(&PartitionId::Name(String::new()));
    device.strip_prefix(prefix.to_str()?).and_then(|num| num.parse::<u32>().ok())
}

/// The rows of `fdisk -l`, which carry the detail the dump format omits:
/// total sectors and the logical/physical sector-size ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdiskList {
    pub total_sectors: u64,
    /// physical / logical sector size; effectively the MBR alignment
    /// granularity, typically 1.
    pub sector_ratio: u64,
    /// Partition rows in on-disk order.
    pub rows: Vec<FdiskRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdiskRow {
    pub num: u32,
    pub start: u64,
    pub end: u64,
    pub code: String,
    pub bootable: bool,
}

impl FdiskList {
    /// Free sectors after the last partition end.
    pub fn empty_space(&self) -> u64 {
        let last = self.rows.iter().map(|row| row.end).max().unwrap_or(0);
        self.total_sectors.saturating_sub(last)
    }

    pub fn row(&self, num: u32) -> Option<&FdiskRow> {
        self.rows.iter().find(|row| row.num == num)
    }
}

/// Queries an MBR device via `fdisk -l`.
pub fn fdisk_list<P: AsRef<Path>>(device: P, naming: &PartitionNaming) -> io::Result<FdiskList> {
    let output = exec_with_output("fdisk", None, None, &[device.as_ref().into(), "-l".into()])?;
    parse_fdisk_list(&output, naming)
}

fn parse_fdisk_list(output: &str, naming: &PartitionNaming) -> io::Result<FdiskList> {
    let mut total_sectors = None;
    let mut sector_ratio = 1;
    let mut columns = None;
    let mut rows = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if total_sectors.is_none() && trimmed.contains(" sectors") {
            // Either "Disk /dev/sdb: ..., 16777216 sectors" (current) or
            // "..., total 16777216 sectors" (older util-linux).
            let mut words = trimmed.split_whitespace().peekable();
            while let Some(word) = words.next() {
                if words.peek().map_or(false, |next| next.starts_with("sectors")) {
                    total_sectors = word.parse::<u64>().ok();
                }
            }
        } else if let Some(rest) = trimmed.strip_prefix("Sector size (logical/physical): ") {
            // "512 bytes / 4096 bytes"
            let mut sizes =
                rest.split('/').filter_map(|part| part.split_whitespace().next()?.parse::<u64>().ok());
            if let (Some(logical), Some(physical)) = (sizes.next(), sizes.next()) {
                if logical > 0 {
                    sector_ratio = physical / logical;
                }
            }
        } else if trimmed.starts_with("Device") {
            // Column offsets vary across fdisk releases; derive them from the
            // header rather than assuming.
            let header: Vec<&str> = trimmed.split_whitespace().collect();
            let find = |name: &str| header.iter().position(|h| *h == name);
            let end = find("End");
            let code = find("Id").or_else(|| find("Type"));
            match (end, code) {
                (Some(end), Some(code)) => columns = Some((end, code)),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("unsupported fdisk header: '{}'", trimmed),
                    ))
                }
            }
        } else if let Some(num) = partition_number(
            trimmed.split_whitespace().next().unwrap_or(""),
            naming,
        ) {
            let (end_col, code_col) =
                columns.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "fdisk row before header"))?;
            let words: Vec<&str> = trimmed.split_whitespace().collect();
            // The Boot column collapses when the flag is absent.
            let bootable = words.get(1) == Some(&"*");
            let offset = if bootable { 0 } else { 1 };
            let start = words
                .get(end_col - offset - 1)
                .map(|w| parse_u64(w))
                .transpose()?;
            let end = words.get(end_col - offset).map(|w| parse_u64(w)).transpose()?;
            let code = words.get(code_col - offset).map(|w| (*w).to_owned());
            match (start, end, code) {
                (Some(start), Some(end), Some(code)) => {
                    rows.push(FdiskRow { num, start, end, code, bootable })
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("malformed fdisk row: '{}'", trimmed),
                    ))
                }
            }
        }
    }

    let total_sectors = total_sectors
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "fdisk output lacks a sector count"))?;

    rows.sort_by(|a, b| a.start.cmp(&b.start));
    Ok(FdiskList { total_sectors, sector_ratio, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> PartitionNaming { PartitionNaming::for_disk("/dev/sdb") }

    const DUMP_CURRENT: &str = r#"label: dos
label-id: 0x5e94f3e5
device: /dev/sdb
unit: sectors
sector-size: 512

/dev/sdb1 : start=        2048, size=     1048576, type=83, bootable
/dev/sdb2 : start=     1050624, size=    15726592, type=5
/dev/sdb5 : start=     1052672, size=     4194304, type=83
/dev/sdb6 : start=     5248000, size=    10478592, type=82
"#;

    const DUMP_LEGACY: &str = r#"# partition table of /dev/sdb
unit: sectors

/dev/sdb1 : start=     2050, size=     1893, Id=83, bootable
/dev/sdb2 : start=     4096, size=     2048, Id=82
"#;

    #[test]
    fn dump_parsing_current() {
        let table = parse_sfdisk_dump(DUMP_CURRENT, &naming()).unwrap();
        assert_eq!(table.id_key, "type");
        assert_eq!(table.entries.len(), 4);
        assert_eq!(table.entries[0].num, 1);
        assert!(table.entries[0].bootable);
        assert!(table.entries[1].is_extended());
        assert_eq!(table.entries[3].code, "82");
    }

    #[test]
    fn dump_parsing_legacy_id_key() {
        let table = parse_sfdisk_dump(DUMP_LEGACY, &naming()).unwrap();
        assert_eq!(table.id_key, "Id");
        assert_eq!(table.entries[0].size, 1893);
        assert!(!table.entries[1].bootable);
    }

    #[test]
    fn script_round_trip_preserves_dialect() {
        let table = parse_sfdisk_dump(DUMP_LEGACY, &naming()).unwrap();
        let script = render_msdos_script(&table, &naming());
        assert_eq!(
            script,
            "unit: sectors\n\n\
             /dev/sdb1 : start= 2050, size= 1893, Id= 83, bootable\n\
             /dev/sdb2 : start= 4096, size= 2048, Id= 82\n"
        );
    }

    const FDISK_CURRENT: &str = r#"Disk /dev/sdb: 8 GiB, 8589934592 bytes, 16777216 sectors
Units: sectors of 1 * 512 = 512 bytes
Sector size (logical/physical): 512 bytes / 4096 bytes
I/O size (minimum/optimal): 512 bytes / 512 bytes
Disklabel type: dos
Disk identifier: 0x5e94f3e5

Device     Boot   Start      End  Sectors  Size Id Type
/dev/sdb1  *       2048  1050623  1048576  512M 83 Linux
/dev/sdb2       1050624 16777215 15726592  7.5G  5 Extended
/dev/sdb5       1052672  5246975  4194304    2G 83 Linux
/dev/sdb6       5248000 15726591 10478592    5G 82 Linux swap / Solaris
"#;

    const FDISK_LEGACY: &str = r#"Disk /dev/sdb: 8589 MB, 8589934592 bytes
255 heads, 63 sectors/track, 1044 cylinders, total 16777216 sectors
Units = sectors of 1 * 512 = 512 bytes
Sector size (logical/physical): 512 bytes / 512 bytes
I/O size (minimum/optimal): 512 bytes / 512 bytes
Disk identifier: 0x000b2b21

   Device Boot      Start         End      Blocks   Id  System
/dev/sdb1   *        2048     1050623      524288   83  Linux
/dev/sdb2         1050624    16777215     7863296    5  Extended
"#;

    #[test]
    fn fdisk_parsing_current() {
        let list = parse_fdisk_list(FDISK_CURRENT, &naming()).unwrap();
        assert_eq!(list.total_sectors, 16_777_216);
        assert_eq!(list.sector_ratio, 8);
        assert_eq!(list.rows.len(), 4);
        assert_eq!(list.row(1).unwrap().code, "83");
        assert!(list.row(1).unwrap().bootable);
        assert_eq!(list.row(2).unwrap().code, "5");
        assert_eq!(list.empty_space(), 16_777_216 - 16_777_215);
    }

    #[test]
    fn fdisk_parsing_legacy_columns() {
        let list = parse_fdisk_list(FDISK_LEGACY, &naming()).unwrap();
        assert_eq!(list.total_sectors, 16_777_216);
        assert_eq!(list.sector_ratio, 1);
        assert_eq!(list.row(1).unwrap().end, 1_050_623);
        assert_eq!(list.row(2).unwrap().code, "5");
        assert!(!list.row(2).unwrap().bootable);
    }

    #[test]
    fn fdisk_rows_in_disk_order() {
        let shuffled = r#"Disk /dev/sdb: 1 GiB, 1073741824 bytes, 2097152 sectors
Sector size (logical/physical): 512 bytes / 512 bytes

Device     Boot   Start      End  Sectors  Size Id Type
/dev/sdb2        204800  2097151  1892352  924M 83 Linux
/dev/sdb1          2048   204799   202752   99M 83 Linux
"#;
        let list = parse_fdisk_list(shuffled, &naming()).unwrap();
        let order: Vec<u32> = list.rows.iter().map(|row| row.num).collect();
        assert_eq!(order, vec![1, 2]);
    }
}
