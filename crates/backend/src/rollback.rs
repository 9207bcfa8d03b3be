//! btrfs rollback script generation
//!
//! The generated script mounts the top level of each affected filesystem,
//! moves the live subvolume aside and puts a writable snapshot of the chosen
//! snapshot in its place. Nothing is changed until the script is run.

use crate::mtab::MountTable;
use chrono::{DateTime, Utc};
use sk_core::timestamp;
use sk_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Stale package manager lock removed from the restored subvolume
const PACMAN_LOCK_FILE: &str = "/var/lib/pacman/db.lck";

/// Output when there is nothing to roll back
pub const NO_MATCH: &str = "# No snapshot matched to rollback.";

/// Script lines restoring each `(source, snapshot)` pair
pub fn rollback_script(
    table: &MountTable,
    source_dests: &[(String, String)],
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    if source_dests.is_empty() {
        return Ok(vec![NO_MATCH.to_string()]);
    }

    let mut lines = Vec::new();

    // 1. Mount the top level volume of every device involved
    let mut mount_points: HashMap<String, String> = HashMap::new();
    for (source, _) in source_dests {
        let live = table.attributes(source)?;
        if !mount_points.contains_key(&live.device) {
            let mount_pt = format!("/run/mount/_snapkeep_internal_{}", mount_points.len());
            lines.push(format!("mkdir -p {mount_pt}"));
            lines.push(format!("mount {} {mount_pt} -o subvolid=5", live.device));
            mount_points.insert(live.device, mount_pt);
        }
    }
    lines.push(String::new());

    // 2. Swap each live subvolume for its snapshot
    let now_str = timestamp::format_suffix(now);
    let mut backup_paths = Vec::new();
    let mut current_dir: Option<&str> = None;
    for (source, dest) in source_dests {
        let dest_dir = parent_dir(dest);
        let live = table.attributes(source)?;
        let backup = table.attributes(&dest_dir)?;
        if backup.device != live.device {
            return Err(Error::Mount(format!(
                "snapshot {dest} is not on the same device as {source}"
            )));
        }

        let mount_pt = mount_points
            .get(&live.device)
            .ok_or_else(|| Error::Mount(format!("no mount point for {}", live.device)))?;
        if current_dir != Some(mount_pt.as_str()) {
            lines.push(format!("cd {mount_pt}"));
            lines.push(String::new());
            current_dir = Some(mount_pt.as_str());
        }

        let live_path = drop_root_slash(&live.subvol_name)?;
        let backup_name = format!("rollback_{now_str}_{live_path}");
        let backup_path = format!("{}/{backup_name}", drop_root_slash(&backup.subvol_name)?);
        backup_paths.push(format!("{dest_dir}/{backup_name}"));

        lines.push(format!("mv {live_path} {backup_path}"));
        lines.push(format!("btrfs subvolume snapshot {dest} {live_path}"));
        if Path::new(&format!("{dest}{PACMAN_LOCK_FILE}")).is_file() {
            lines.push(format!("rm {live_path}{PACMAN_LOCK_FILE}"));
        }
        lines.push(String::new());
    }

    // 3. Instructions
    lines.push("echo Please reboot to complete the rollback.".to_string());
    lines.push("echo".to_string());
    lines.push("echo After reboot you may delete -".to_string());
    for path in backup_paths {
        lines.push(format!("echo \"# sudo btrfs subvolume delete {path}\""));
    }

    Ok(lines)
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `/@home` -> `@home`; nested subvolumes are rejected
fn drop_root_slash(subvol: &str) -> Result<&str> {
    let rest = subvol
        .strip_prefix('/')
        .ok_or_else(|| Error::Mount(format!("could not drop initial / from {subvol:?}")))?;
    if rest.contains('/') {
        return Err(Error::Mount(format!(
            "unexpected / after the first one in subvolume {subvol:?}"
        )));
    }
    Ok(rest)
}
