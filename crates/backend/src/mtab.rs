//! Mount table lookup
//!
//! Resolves a path to the device and btrfs subvolume it lives on, using the
//! longest mount point that contains it.

use sk_core::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One line of `/etc/mtab`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
    pub options: String,
}

/// Where a path is mounted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountAttributes {
    /// Block device, e.g. `/dev/sda2`
    pub device: String,
    /// Subvolume path relative to the filesystem root, e.g. `/@home`
    pub subvol_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse mtab formatted text; short lines are ignored
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                Some(MountEntry {
                    device: unescape(fields.next()?),
                    mount_point: unescape(fields.next()?),
                    fstype: fields.next()?.to_string(),
                    options: fields.next()?.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Device and subvolume backing `path`
    pub fn attributes(&self, path: &str) -> Result<MountAttributes> {
        let matched = self
            .entries
            .iter()
            // autofs placeholders have a real entry alongside them
            .filter(|e| e.fstype != "autofs")
            .filter(|e| Path::new(path).starts_with(&e.mount_point))
            .max_by_key(|e| e.mount_point.len())
            .ok_or_else(|| Error::Mount(format!("mount point not found: {path}")))?;
        debug!("Found matching mount line: {:?}", matched);

        if matched.fstype != "btrfs" {
            return Err(Error::Mount(format!(
                "mount point is not btrfs: {path} ({})",
                matched.fstype
            )));
        }

        let mut subvol_name = option_value(&matched.options, "subvol").ok_or_else(|| {
            Error::Mount(format!("could not find subvol= in {:?}", matched.options))
        })?;

        if matched.mount_point != path {
            let nested = path.strip_prefix(matched.mount_point.as_str()).unwrap_or(path);
            subvol_name = if nested.starts_with('/') {
                nested.to_string()
            } else {
                format!("{}/{}", subvol_name.trim_end_matches('/'), nested)
            };
        }

        Ok(MountAttributes {
            device: matched.device.clone(),
            subvol_name,
        })
    }
}

/// Value of `key=` in a comma separated option list
fn option_value(options: &str, key: &str) -> Option<String> {
    options.split(',').find_map(|option| {
        option
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// Decode the octal escapes (`\040` for space) used in mtab fields
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let is_escape = bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b));
        if is_escape {
            let digits = &field[i + 1..i + 4];
            if let Ok(value) = u8::from_str_radix(digits, 8) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
