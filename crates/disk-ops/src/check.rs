use disk_types::{LayoutEntry, PartitionId};

/// Why a source cannot be copied onto a target partition-for-partition.
#[derive(Debug, Fail)]
pub enum IncompatibleLayout {
    #[fail(display = "source has {} partitions but target has {}", source, target)]
    CountMismatch { source: usize, target: usize },
    #[fail(
        display = "partition order differs: source has {} where target has {}",
        source, target
    )]
    OrderMismatch { source: PartitionId, target: PartitionId },
    #[fail(
        display = "partition {} is {} on the source but {} on the target",
        partition, source, target
    )]
    FilesystemMismatch { partition: PartitionId, source: String, target: String },
    #[fail(
        display = "partition {} holds {} sectors but the target partition only has {}",
        partition, used, size
    )]
    TooSmall { partition: PartitionId, used: u64, size: u64 },
}

/// Checks that the target's existing layout can receive the source's data
/// without any table rewrite.
///
/// Partitions must appear in the same order with the same filesystems, and
/// each target partition must be large enough for the data it will hold.
/// Pairs whose source usage is unknown are skipped for the size check.
pub fn verify_layouts(
    source: &[LayoutEntry],
    target: &[LayoutEntry],
) -> Result<(), IncompatibleLayout> {
    if source.len() != target.len() {
        return Err(IncompatibleLayout::CountMismatch {
            source: source.len(),
            target: target.len(),
        });
    }

    for (src, tgt) in source.iter().zip(target) {
        if src.id != tgt.id {
            return Err(IncompatibleLayout::OrderMismatch {
                source: src.id.clone(),
                target: tgt.id.clone(),
            });
        }

        if src.fs != tgt.fs {
            return Err(IncompatibleLayout::FilesystemMismatch {
                partition: src.id.clone(),
                source: fs_label(src),
                target: fs_label(tgt),
            });
        }

        match src.used {
            Some(used) if used > tgt.size => {
                return Err(IncompatibleLayout::TooSmall {
                    partition: src.id.clone(),
                    used,
                    size: tgt.size,
                });
            }
            Some(_) => (),
            None => debug!("usage of {} is unknown; skipping its size check", src.id),
        }
    }

    Ok(())
}

fn fs_label(entry: &LayoutEntry) -> String {
    entry.fs.map_or_else(|| "unformatted".into(), |fs| <&'static str>::from(fs).into())
}
