use crate::substitute::multireplace;
use std::collections::HashMap;

/// Rewrites an fstab so its device identifiers point at the clone.
///
/// Only the device field of each entry is translated, using the source to
/// target identifier map. Comments and blank lines pass through untouched,
/// and entries whose identifier is not in the map are kept as they are.
pub fn rewrite_fstab(contents: &str, uuid_map: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(contents.len() + 128);
    output.push_str(
        "# Rewritten for the cloned drive. Comments were copied but not parsed,\n\
         # so identifiers mentioned in them may be stale.\n\n",
    );

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            output.push_str(line);
            output.push('\n');
            continue;
        }

        let mut words = trimmed.split_whitespace();
        if let Some(device) = words.next() {
            let replaced = multireplace(device, uuid_map);
            if replaced == device && (device.starts_with("UUID") || device.starts_with("LABEL")) {
                debug!("fstab identifier {} has no translation", device);
            }

            output.push_str(&replaced);
            for word in words {
                output.push(' ');
                output.push_str(word);
            }
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    const FSTAB: &str = "\
# /etc/fstab: static file system information.
#
# <file system> <mount point>   <type>  <options>       <dump>  <pass>
UUID=f5fa1db1-366f-4a04-b1c6-3935e8717a6b /               ext4    errors=remount-ro 0       1
UUID=2E0A-2CDB  /boot/efi       vfat    umask=0077      0       1
/dev/mapper/vg0-swap none            swap    sw              0       0
";

    #[test]
    fn device_fields_are_translated() {
        let uuid_map = map(&[
            ("f5fa1db1-366f-4a04-b1c6-3935e8717a6b", "9e47a743-69d0-4f18-9a2c-4b57ba55cd6f"),
            ("2E0A-2CDB", "491D-135F"),
            ("vg0-swap", "clone--vg-swap"),
        ]);

        let rewritten = rewrite_fstab(FSTAB, &uuid_map);

        assert!(rewritten
            .contains("UUID=9e47a743-69d0-4f18-9a2c-4b57ba55cd6f / ext4 errors=remount-ro 0 1"));
        assert!(rewritten.contains("UUID=491D-135F /boot/efi vfat umask=0077 0 1"));
        assert!(rewritten.contains("/dev/mapper/clone--vg-swap none swap sw 0 0"));
    }

    #[test]
    fn comments_survive_unparsed() {
        let rewritten = rewrite_fstab(FSTAB, &HashMap::new());
        assert!(rewritten.contains("# /etc/fstab: static file system information."));
        assert!(rewritten.contains("# <file system> <mount point>"));
    }

    #[test]
    fn unknown_identifiers_are_left_alone() {
        let rewritten = rewrite_fstab("LABEL=data /srv ext4 defaults 0 2\n", &HashMap::new());
        assert!(rewritten.contains("LABEL=data /srv ext4 defaults 0 2"));
    }
}
