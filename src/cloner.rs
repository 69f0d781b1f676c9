use crate::{
    bootloader::{strategy_by_name, BootOptions},
    errors::CloneError,
    fstab::rewrite_fstab,
    process::{rsync_progress, watch_child},
};
use disk_ops::{
    plan_gpt, plan_lvm, rebuild_volume_group, shrink_msdos, verify_layouts, write_gpt_table,
    write_msdos_table, ResizeRequest, MSDOS_DEFAULT_MARGIN,
};
use disk_types::{PartitionId, PartitionTable};
use disks::{BlockDevice, DiskError, DiskManager, LvmVolumeGroup};
use external::{mapper_fragment, partprobe, sfdisk_dump};
use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::{OsStr, OsString},
    fs, io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tempdir::TempDir;

pub const DEFAULT_RSYNC_ARGS: &[&str] = &["-aAXxH", "--delete"];

/// Paths that hold no data worth carrying to the clone.
const RSYNC_EXCLUDES: &[&str] = &[
    "/dev/*",
    "/proc/*",
    "/sys/*",
    "/tmp/*",
    "/run/*",
    "/mnt/*",
    "/media/*",
    "/lost+found",
    "/home/*/.gvfs",
];

/// Clones a source drive onto a target, partition by partition.
///
/// The pairing assumes equivalent layouts: data on partition 1 of the source
/// belongs on partition 1 of the target. [`Cloner::transfer_table`] creates
/// that layout when the target does not have it yet, and
/// [`Cloner::layouts_valid`] checks an existing one.
pub struct Cloner {
    source: BlockDevice,
    target: BlockDevice,
    volume_groups: Option<(LvmVolumeGroup, LvmVolumeGroup)>,
    excluded: Vec<PartitionId>,
    rsync_args: Vec<String>,
    uuid_map: IdentityCache,
}

impl Cloner {
    pub fn new<S: Into<PathBuf>, T: Into<PathBuf>>(source: S, target: T) -> Cloner {
        Cloner {
            source: BlockDevice::new(source),
            target: BlockDevice::new(target),
            volume_groups: None,
            excluded: Vec::new(),
            rsync_args: DEFAULT_RSYNC_ARGS.iter().map(|s| s.to_string()).collect(),
            uuid_map: IdentityCache::new(),
        }
    }

    /// Also clone the given volume group onto another after the plain
    /// partitions are done.
    pub fn with_volume_groups(mut self, source: &str, target: &str) -> Cloner {
        self.volume_groups = Some((LvmVolumeGroup::new(source), LvmVolumeGroup::new(target)));
        self
    }

    /// Leave a partition out of copying, fstab rewriting, and boot repair.
    pub fn exclude(mut self, partition: PartitionId) -> Cloner {
        self.excluded.push(partition);
        self
    }

    /// Override the arguments rsync runs with.
    pub fn with_rsync_args<I, S>(mut self, args: I) -> Cloner
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rsync_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(&self) -> &BlockDevice { &self.source }

    pub fn target(&self) -> &BlockDevice { &self.target }

    pub fn excluded(&self) -> &[PartitionId] { &self.excluded }

    /// Rebuilds the target's partition table from the source's, shrinking
    /// partitions as needed when the target is smaller.
    ///
    /// The new partitions are formatted afterwards. Progress climbs to 0.3
    /// once the table is written and 1.0 when formatting finishes.
    pub fn transfer_table(
        &self,
        resize: bool,
        callback: Option<&dyn Fn(f64)>,
    ) -> Result<(), CloneError> {
        let source_sectors = self.source.sectors()?;
        let target_sectors = self.target.sectors()?;
        if target_sectors < source_sectors && !resize {
            return Err(CloneError::ResizeDisabled);
        }

        self.unmount_target_partitions()?;

        match self.source.table_type()? {
            PartitionTable::Gpt => {
                let request = ResizeRequest::new(
                    source_sectors,
                    target_sectors,
                    self.target.alignment()?,
                    self.source.empty_space()?,
                );
                let plan = plan_gpt(&request, &self.source.source_partitions()?)?;
                write_gpt_table(self.target.device(), &plan)
                    .map_err(|why| self.table_write(why))?;
            }
            PartitionTable::Msdos => {
                let table = sfdisk_dump(self.source.device(), self.source.naming())
                    .map_err(|why| self.source_query(why))?;
                let shrunk = shrink_msdos(
                    &table,
                    |num| self.source.usage_of(&PartitionId::Number(num)),
                    source_sectors as i64 - target_sectors as i64,
                    MSDOS_DEFAULT_MARGIN,
                )?;
                write_msdos_table(self.target.device(), self.target.naming(), &shrunk)
                    .map_err(|why| self.table_write(why))?;
            }
            PartitionTable::Lvm => {
                return Err(CloneError::Device {
                    why: DiskError::UnsupportedOperation {
                        what: "table transfer from a volume group",
                    },
                });
            }
        }

        if let Some(cb) = callback {
            cb(0.3);
        }

        // The kernel will not see the new layout until told to rescan.
        partprobe(self.target.device()).map_err(|why| self.table_write(why))?;

        match callback {
            Some(cb) => {
                self.format_pair(&self.source, &self.target, true, Some(&|fraction: f64| {
                    cb(0.3 + fraction * 0.7)
                }))?
            }
            None => self.format_pair(&self.source, &self.target, true, None)?,
        }

        if let Some(cb) = callback {
            cb(1.0);
        }

        // Every partition now carries a fresh filesystem identifier.
        self.uuid_map.invalidate();
        Ok(())
    }

    /// Rebuilds the target volume group's logical volumes from the source's,
    /// shrinking them as needed, then formats them.
    pub fn transfer_lvm(&self, callback: Option<&dyn Fn(f64)>) -> Result<(), CloneError> {
        if let Some((source, target)) = &self.volume_groups {
            target.remove_volumes()?;

            let plan = plan_lvm(
                source.sectors()?,
                target.sectors()?,
                source.empty_space()?,
                &source.source_partitions()?,
            )?;

            rebuild_volume_group(target.device(), &plan).map_err(|why| {
                CloneError::TableWrite { device: target.device().to_path_buf(), why }
            })?;

            self.format_pair(source, target, true, callback)?;
            self.uuid_map.invalidate();
        }

        Ok(())
    }

    /// Checks that the target's existing layout can receive the source's
    /// data, so a clone onto a pre-partitioned drive can skip the rewrite.
    pub fn layouts_valid(&self) -> Result<(), CloneError> {
        verify_layouts(&self.source.layout()?, &self.target.layout()?)?;
        if let Some((source, target)) = &self.volume_groups {
            verify_layouts(&source.layout()?, &target.layout()?)?;
        }

        Ok(())
    }

    /// Formats each target partition to match the filesystem on its source
    /// counterpart. With `ignore_errors`, filesystems that cannot be created
    /// are logged and skipped.
    pub fn format_partitions(
        &self,
        ignore_errors: bool,
        callback: Option<&dyn Fn(f64)>,
    ) -> Result<(), CloneError> {
        self.format_pair(&self.source, &self.target, ignore_errors, callback)
    }

    /// Copies all files, one partition at a time, with rsync.
    ///
    /// The callback receives each partition's progress as a fraction; a
    /// negative value reports a partition that failed while
    /// `ignore_failures` was set.
    pub fn copy_files(
        &self,
        ignore_failures: bool,
        callback: Option<&dyn Fn(&PartitionId, f64)>,
    ) -> Result<(), CloneError> {
        self.copy_pair(&self.source, &self.target, ignore_failures, callback)?;
        if let Some((source, target)) = &self.volume_groups {
            self.copy_pair(source, target, ignore_failures, callback)?;
        }

        Ok(())
    }

    /// Rewrites every fstab found on the target so it refers to the
    /// target's own identifiers.
    pub fn copy_fstab(&self) -> Result<(), CloneError> {
        let uuid_map = self.uuid_map()?;
        self.fstab_pair(&self.source, &self.target, &uuid_map)?;
        if let Some((source, target)) = &self.volume_groups {
            self.fstab_pair(source, target, &uuid_map)?;
        }

        Ok(())
    }

    /// Makes the clone bootable: rewrites fstab, then runs the named
    /// bootloader strategy. The callback reports completion.
    pub fn make_bootable(
        &self,
        strategy: Option<&str>,
        options: &BootOptions,
        callback: Option<&dyn Fn(bool)>,
    ) -> Result<(), CloneError> {
        if let Some(cb) = callback {
            cb(false);
        }

        let bootloader = match strategy {
            Some(name) => Some(strategy_by_name(name)?),
            None => None,
        };

        if let Err(why) = self.copy_fstab() {
            warn!("unable to rewrite fstab; continuing anyway: {}", why);
        }

        match bootloader {
            Some(plugin) => {
                info!("installing the bootloader with the {} strategy", plugin.name());
                plugin.install(self, options)?;
            }
            None => warn!("no bootloader strategy specified; the clone may not boot on its own"),
        }

        if let Some(cb) = callback {
            cb(true);
        }

        Ok(())
    }

    /// Source-to-target identifier map: filesystem UUIDs, partition UUIDs,
    /// and device-mapper names for logical volumes. Cached until a transfer
    /// invalidates it.
    pub fn uuid_map(&self) -> Result<HashMap<String, String>, CloneError> {
        self.uuid_map.get_or_build(|| self.collect_identifiers())
    }

    fn collect_identifiers(&self) -> Result<HashMap<String, String>, CloneError> {
        let mut map = HashMap::new();
        for id in self.source.partitions()? {
            // Some partition kinds, like a Microsoft reserved partition,
            // report no UUID at all.
            if let (Some(source_uuid), Some(target_uuid)) =
                (self.source.partition_uuid(&id), self.target.partition_uuid(&id))
            {
                if !source_uuid.trim().is_empty() {
                    map.insert(source_uuid, target_uuid);
                }
            }

            if let (Some(source_part), Some(target_part)) =
                (self.source.partition_partuuid(&id), self.target.partition_partuuid(&id))
            {
                if !source_part.trim().is_empty() {
                    map.insert(source_part, target_part);
                }
            }
        }

        if let Some((source, target)) = &self.volume_groups {
            for id in source.partitions()? {
                let volume = id.to_string();
                map.insert(
                    mapper_fragment(source.name(), &volume),
                    mapper_fragment(target.name(), &volume),
                );
            }
        }

        debug!("identifier map: {:?}", map);
        Ok(map)
    }

    fn unmount_target_partitions(&self) -> Result<(), CloneError> {
        match self.target.partitions() {
            Ok(partitions) => {
                for partition in &partitions {
                    self.target.unmount(partition)?;
                }
                Ok(())
            }
            // A blank target has no partitions to unmount.
            Err(DiskError::UnsupportedTable { .. }) => Ok(()),
            Err(why) => Err(why.into()),
        }
    }

    fn format_pair(
        &self,
        source: &dyn DiskManager,
        target: &dyn DiskManager,
        ignore_errors: bool,
        callback: Option<&dyn Fn(f64)>,
    ) -> Result<(), CloneError> {
        let partitions = source.partitions()?;
        let total = partitions.len();

        for (done, id) in partitions.iter().enumerate() {
            let outcome = source.partition_fs(id).and_then(|fs| match fs {
                Some(fs) => {
                    info!("formatting partition {} of {} as {}", id, target.device().display(), fs);
                    target.format_partition(id, fs)
                }
                None => {
                    warn!("no filesystem recognized on partition {}; left unformatted", id);
                    Ok(())
                }
            });

            if let Err(why) = outcome {
                if ignore_errors {
                    warn!(
                        "unable to format partition {} on {}; skipped: {}",
                        id,
                        target.device().display(),
                        why
                    );
                } else {
                    return Err(why.into());
                }
            }

            if let Some(cb) = callback {
                cb((done + 1) as f64 / total as f64);
            }
        }

        Ok(())
    }

    fn copy_pair(
        &self,
        source: &dyn DiskManager,
        target: &dyn DiskManager,
        ignore_failures: bool,
        callback: Option<&dyn Fn(&PartitionId, f64)>,
    ) -> Result<(), CloneError> {
        for id in source.partitions()? {
            if self.excluded.contains(&id) {
                continue;
            }

            if let Err(why) = self.copy_partition(source, target, &id, callback) {
                if ignore_failures {
                    warn!(
                        "unable to copy partition {} from {} to {}: {}",
                        id,
                        source.device().display(),
                        target.device().display(),
                        why
                    );
                    if let Some(cb) = callback {
                        cb(&id, -1.0);
                    }
                } else {
                    return Err(why);
                }
            }
        }

        Ok(())
    }

    fn copy_partition(
        &self,
        source: &dyn DiskManager,
        target: &dyn DiskManager,
        id: &PartitionId,
        callback: Option<&dyn Fn(&PartitionId, f64)>,
    ) -> Result<(), CloneError> {
        let source_mount = ScopedMount::establish(source, id)?;
        let target_mount = ScopedMount::establish(target, id)?;

        info!("starting rsync for partition {} of {}", id, source.device().display());
        let args = rsync_arguments(
            &self.rsync_args,
            source_mount.path(),
            target_mount.path(),
            callback.is_some(),
        );
        debug!("executing rsync with {:?}", args);

        let mut child = Command::new("rsync")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|why| CloneError::Copy { partition: id.clone(), why })?;

        let stderr = watch_child(&mut child, |record| {
            if let Some(cb) = callback {
                if let Some(fraction) = rsync_progress(record) {
                    cb(id, fraction);
                }
            }
        })
        .map_err(|why| CloneError::Copy { partition: id.clone(), why })?;

        let status =
            child.wait().map_err(|why| CloneError::Copy { partition: id.clone(), why })?;
        if !status.success() {
            return Err(CloneError::Copy {
                partition: id.clone(),
                why: io::Error::new(
                    io::ErrorKind::Other,
                    format!("rsync failed with status {:?}: {}", status.code(), stderr.trim()),
                ),
            });
        }

        if !stderr.trim().is_empty() {
            debug!("rsync reports for partition {}: {}", id, stderr.trim());
        }

        if let Some(cb) = callback {
            cb(id, 1.0);
        }

        Ok(())
    }

    fn fstab_pair(
        &self,
        source: &dyn DiskManager,
        target: &dyn DiskManager,
        uuid_map: &HashMap<String, String>,
    ) -> Result<(), CloneError> {
        for id in source.partitions()? {
            if self.excluded.contains(&id) {
                continue;
            }

            let source_mount = match ScopedMount::establish(source, &id) {
                Ok(mount) => mount,
                Err(CloneError::Device { why: DiskError::NotMountable { .. } })
                | Err(CloneError::Device { why: DiskError::Mount { .. } }) => {
                    debug!("partition {} not inspected for an fstab", id);
                    continue;
                }
                Err(why) => return Err(why),
            };

            let fstab = source_mount.path().join("etc/fstab");
            if !fstab.exists() {
                continue;
            }

            info!("rewriting the fstab found on partition {}", id);
            let contents = fs::read_to_string(&fstab)
                .map_err(|why| CloneError::Copy { partition: id.clone(), why })?;

            let target_mount = ScopedMount::establish(target, &id)?;
            let rewritten = rewrite_fstab(&contents, uuid_map);
            fs::write(target_mount.path().join("etc/fstab"), rewritten)
                .map_err(|why| CloneError::Copy { partition: id.clone(), why })?;
        }

        Ok(())
    }

    fn source_query(&self, why: io::Error) -> CloneError {
        CloneError::Device {
            why: DiskError::Query { device: self.source.device().to_path_buf(), why },
        }
    }

    fn table_write(&self, why: io::Error) -> CloneError {
        CloneError::TableWrite { device: self.target.device().to_path_buf(), why }
    }
}

/// The identifier correspondence map, kept between operations. Any table
/// rewrite hands out fresh UUIDs, so whoever rewrites must discard the
/// cached map or later fstab and boot rewrites would plant stale values.
pub(crate) struct IdentityCache {
    map: RefCell<Option<HashMap<String, String>>>,
}

impl IdentityCache {
    pub(crate) fn new() -> IdentityCache { IdentityCache { map: RefCell::new(None) } }

    /// Answers from the cache, or builds and remembers a fresh map.
    pub(crate) fn get_or_build<E, F>(&self, build: F) -> Result<HashMap<String, String>, E>
    where
        F: FnOnce() -> Result<HashMap<String, String>, E>,
    {
        if let Some(map) = self.map.borrow().as_ref() {
            return Ok(map.clone());
        }

        let map = build()?;
        self.map.replace(Some(map.clone()));
        Ok(map)
    }

    pub(crate) fn invalidate(&self) { self.map.replace(None); }
}

/// A partition mounted somewhere file operations can reach it. Partitions
/// already mounted are used in place; ones mounted here are released when
/// the value drops.
pub(crate) struct ScopedMount<'a> {
    manager: &'a dyn DiskManager,
    partition: &'a PartitionId,
    scratch: Option<TempDir>,
    point: PathBuf,
}

impl<'a> ScopedMount<'a> {
    pub(crate) fn establish(
        manager: &'a dyn DiskManager,
        partition: &'a PartitionId,
    ) -> Result<ScopedMount<'a>, CloneError> {
        if let Some(point) = manager.mount_point(partition)? {
            return Ok(ScopedMount { manager, partition, scratch: None, point });
        }

        let scratch = TempDir::new("drivesync").map_err(|why| CloneError::Device {
            why: DiskError::Query { device: manager.partition_path(partition), why },
        })?;
        manager.mount(partition, scratch.path())?;

        let point = scratch.path().to_path_buf();
        Ok(ScopedMount { manager, partition, scratch: Some(scratch), point })
    }

    pub(crate) fn path(&self) -> &Path { &self.point }
}

impl<'a> Drop for ScopedMount<'a> {
    fn drop(&mut self) {
        if self.scratch.is_some() {
            if let Err(why) = self.manager.unmount(self.partition) {
                warn!("unable to unmount {}: {}", self.partition, why);
            }
        }
    }
}

/// Full rsync argument list for one partition copy. The source path gets a
/// trailing slash so rsync copies the partition's contents rather than the
/// mount directory itself.
fn rsync_arguments(
    user_args: &[String],
    from: &Path,
    to: &Path,
    with_progress: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = user_args.iter().map(OsString::from).collect();
    for exclude in RSYNC_EXCLUDES {
        args.push(format!("--exclude={}", exclude).into());
    }

    if with_progress {
        args.push("--info=progress2".into());
    }

    let mut from = OsString::from(from.as_os_str());
    if !from.to_string_lossy().ends_with('/') {
        from.push(OsStr::new("/"));
    }
    args.push(from);
    args.push(to.as_os_str().to_owned());

    args
}
