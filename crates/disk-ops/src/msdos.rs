use crate::plan::PlanError;
use external::MsdosTable;

/// Shrinks an MS-DOS table in place until it fits a target that is
/// `difference` sectors smaller than the source.
///
/// Entries are walked in on-disk order. Every shrink slides the start of all
/// later partitions back by the same amount, and logical partitions shrink
/// their containing extended partition with them. A percentage `margin` of
/// each partition's free space is left untouched.
///
/// `usage` reports a partition's used sectors, or `None` when the filesystem
/// could not be inspected. Unknown partitions are carried at full size.
pub fn shrink_msdos(
    table: &MsdosTable,
    usage: impl Fn(u32) -> Option<u64>,
    mut difference: i64,
    margin: u64,
) -> Result<MsdosTable, PlanError> {
    let mut entries = table.entries.clone();
    let mut move_start_back_by = 0;
    let mut extended: Option<usize> = None;

    for idx in 0..entries.len() {
        entries[idx].start -= move_start_back_by;

        // A primary partition ends the run of logicals inside the current
        // extended container.
        if extended.is_some() && entries[idx].num <= 4 && !entries[idx].is_extended() {
            extended = None;
        }

        if entries[idx].is_extended() {
            extended = Some(idx);
            continue;
        }

        let mut shrink = 0;
        match usage(entries[idx].num) {
            Some(used) => {
                let slack =
                    entries[idx].size.saturating_sub(used) * (100 - margin.min(100)) / 100;
                if slack > 0 && difference > 0 {
                    if slack as i64 >= difference {
                        shrink = difference as u64;
                        difference = 0;
                    } else {
                        shrink = slack;
                        difference -= slack as i64;
                    }

                    move_start_back_by += shrink;
                    entries[idx].size -= shrink;
                }
            }
            None => warn!(
                "usage of partition {} is unknown, keeping its full size",
                entries[idx].num
            ),
        }

        if let Some(container) = extended {
            entries[container].size -= shrink;
        }
    }

    if difference > 0 {
        return Err(PlanError::InsufficientSpace { shortfall: difference as u64 });
    }

    Ok(MsdosTable { entries, id_key: table.id_key.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MSDOS_DEFAULT_MARGIN;
    use external::MsdosEntry;

    fn entry(num: u32, start: u64, size: u64, code: &str) -> MsdosEntry {
        MsdosEntry { num, start, size, code: code.into(), bootable: num == 1 }
    }

    fn usage_table(pairs: &[(u32, u64)]) -> impl Fn(u32) -> Option<u64> + '_ {
        move |num| pairs.iter().find(|(n, _)| *n == num).map(|(_, used)| *used)
    }

    #[test]
    fn later_partitions_slide_back_by_the_shrunk_amount() {
        let table = MsdosTable {
            entries: vec![
                entry(1, 2_048, 1_048_576, "83"),
                entry(2, 1_050_624, 1_048_576, "83"),
            ],
            id_key: "type".into(),
        };

        let shrunk = shrink_msdos(
            &table,
            usage_table(&[(1, 524_288), (2, 524_288)]),
            100_000,
            MSDOS_DEFAULT_MARGIN,
        )
        .unwrap();

        assert_eq!(shrunk.entries[0].start, 2_048);
        assert_eq!(shrunk.entries[0].size, 948_576);
        assert_eq!(shrunk.entries[1].start, 950_624);
        assert_eq!(shrunk.entries[1].size, 1_048_576);
        assert!(shrunk.entries[0].bootable);
    }

    #[test]
    fn margin_limits_how_much_a_partition_gives_up() {
        let table = MsdosTable {
            entries: vec![
                entry(1, 2_048, 1_000_000, "83"),
                entry(2, 1_002_048, 1_000_000, "83"),
            ],
            id_key: "type".into(),
        };

        // Partition 1 is empty, but 5% of its slack stays behind, so
        // covering the deficit takes both partitions.
        let shrunk = shrink_msdos(
            &table,
            usage_table(&[(1, 0), (2, 0)]),
            1_000_000,
            MSDOS_DEFAULT_MARGIN,
        )
        .unwrap();

        assert_eq!(shrunk.entries[0].size, 50_000);
        assert_eq!(shrunk.entries[1].size, 950_000);
    }

    #[test]
    fn logical_shrinks_reduce_the_extended_container() {
        let table = MsdosTable {
            entries: vec![
                entry(1, 2_048, 1_048_576, "83"),
                entry(2, 1_050_624, 4_194_304, "5"),
                entry(5, 1_052_672, 2_097_152, "83"),
                entry(6, 3_151_872, 2_093_056, "82"),
            ],
            id_key: "Id".into(),
        };

        let shrunk = shrink_msdos(
            &table,
            usage_table(&[(1, 1_048_576), (5, 1_048_576), (6, 2_093_056)]),
            500_000,
            0,
        )
        .unwrap();

        // Only the first logical had slack; the container gives up the same
        // amount and the later logical slides back.
        assert_eq!(shrunk.entries[1].code, "5");
        assert_eq!(shrunk.entries[1].size, 4_194_304 - 500_000);
        assert_eq!(shrunk.entries[2].size, 2_097_152 - 500_000);
        assert_eq!(shrunk.entries[3].start, 3_151_872 - 500_000);
        assert_eq!(shrunk.entries[3].size, 2_093_056);
        assert_eq!(shrunk.id_key, "Id");
    }

    #[test]
    fn unknown_usage_skips_the_partition() {
        let table = MsdosTable {
            entries: vec![
                entry(1, 2_048, 1_048_576, "83"),
                entry(2, 1_050_624, 1_048_576, "83"),
            ],
            id_key: "type".into(),
        };

        let shrunk =
            shrink_msdos(&table, usage_table(&[(2, 24_288)]), 100_000, MSDOS_DEFAULT_MARGIN)
                .unwrap();

        assert_eq!(shrunk.entries[0].size, 1_048_576);
        assert_eq!(shrunk.entries[1].size, 948_576);
    }

    #[test]
    fn unsatisfiable_deficit_is_an_error() {
        let table = MsdosTable {
            entries: vec![entry(1, 2_048, 1_048_576, "83")],
            id_key: "type".into(),
        };

        match shrink_msdos(&table, usage_table(&[(1, 1_048_576)]), 100_000, 0) {
            Err(PlanError::InsufficientSpace { shortfall }) => assert_eq!(shortfall, 100_000),
            other => panic!("expected InsufficientSpace, got {:?}", other),
        }
    }
}
