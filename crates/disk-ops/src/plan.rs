use disk_types::{PartitionId, SourcePartition};

/// Why a layout could not be planned for the target.
#[derive(Debug, Fail)]
pub enum PlanError {
    #[fail(
        display = "target is {} sectors short even after shrinking every partition",
        shortfall
    )]
    InsufficientSpace { shortfall: u64 },
}

/// Geometry that the planner works from. Sizes are in 512-byte sectors.
#[derive(Debug, Clone, new)]
pub struct ResizeRequest {
    pub source_sectors: u64,
    pub target_sectors: u64,
    /// Sector alignment that new partitions must honor.
    pub alignment: u64,
    /// Unpartitioned space trailing the last partition on the source.
    pub empty_space: u64,
    #[new(value = "super::GPT_RESERVED_TRAILING")]
    pub reserved_trailing: u64,
}

/// The size a partition will be created with on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedSize {
    Sectors(u64),
    /// The partition claims whatever remains of the disk.
    RestOfDisk,
}

/// One partition of the planned layout.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PlanEntry {
    pub id: PartitionId,
    pub size: PlannedSize,
    pub code: String,
}

/// A target layout, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizePlan {
    pub entries: Vec<PlanEntry>,
}

/// Plans a GPT layout that fits the target by shrinking partitions from the
/// end of the disk forward.
///
/// `partitions` must be in on-disk order. Each partition's free space,
/// rounded down to the alignment, is reclaimed until the deficit between the
/// drives is covered. The final on-disk partition is always created
/// unbounded so it absorbs whatever the target has left over.
pub fn plan_gpt(
    request: &ResizeRequest,
    partitions: &[SourcePartition],
) -> Result<ResizePlan, PlanError> {
    let align = request.alignment.max(1);
    let mut difference = request.source_sectors as i64 - request.target_sectors as i64;

    // Unpartitioned space on the source never needed copying, though the
    // trailing sectors stay reserved for the backup header. A source packed
    // past that reserve grows the deficit instead.
    difference -= request.empty_space as i64 - request.reserved_trailing as i64;

    let mut entries = Vec::with_capacity(partitions.len());
    for (pos, part) in partitions.iter().enumerate().rev() {
        let used = part.used.unwrap_or(part.size);
        let slack = align * (part.size.saturating_sub(used) / align);

        let planned;
        if slack > 0 && difference > 0 {
            if slack as i64 > difference {
                planned = align * ceil_div(part.size - difference as u64, align);
                difference = 0;
            } else {
                planned = align * ceil_div(used, align);
                difference -= slack as i64;
            }
        } else {
            planned = align * ceil_div(part.size, align);
            // Alignment may have grown the partition past its source size.
            difference += planned as i64 - part.size as i64;
        }

        let size = if pos + 1 == partitions.len() {
            PlannedSize::RestOfDisk
        } else {
            PlannedSize::Sectors(planned)
        };

        entries.push(PlanEntry::new(part.id.clone(), size, part.code.clone()));
    }

    if difference > 0 {
        return Err(PlanError::InsufficientSpace { shortfall: difference as u64 });
    }

    entries.reverse();
    Ok(ResizePlan { entries })
}

/// Plans logical volume sizes for a smaller volume group.
///
/// Free extents in the source group are deducted from the deficit first.
/// Volumes then give up their unused space, without alignment rounding, in
/// the order given. There is no rest-of-disk volume; every size is exact.
pub fn plan_lvm(
    source_sectors: u64,
    target_sectors: u64,
    source_free: u64,
    volumes: &[SourcePartition],
) -> Result<ResizePlan, PlanError> {
    let mut difference =
        source_sectors as i64 - target_sectors as i64 - source_free as i64;

    let mut entries = Vec::with_capacity(volumes.len());
    for volume in volumes {
        if volume.used.is_none() {
            warn!("usage of {} is unknown, keeping its full size", volume.id);
        }

        let used = volume.used.unwrap_or(volume.size);
        let slack = volume.size.saturating_sub(used);

        let planned = if slack > 0 && difference > 0 {
            if slack as i64 > difference {
                let planned = volume.size - difference as u64;
                difference = 0;
                planned
            } else {
                difference -= slack as i64;
                used
            }
        } else {
            volume.size
        };

        entries.push(PlanEntry::new(
            volume.id.clone(),
            PlannedSize::Sectors(planned),
            volume.code.clone(),
        ));
    }

    if difference > 0 {
        return Err(PlanError::InsufficientSpace { shortfall: difference as u64 });
    }

    Ok(ResizePlan { entries })
}

fn ceil_div(value: u64, divisor: u64) -> u64 { (value + divisor - 1) / divisor }
