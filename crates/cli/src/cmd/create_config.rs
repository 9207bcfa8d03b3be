//! Bootstrap a config file from the bundled template

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use sk_core::config::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE: &str = include_str!("../../assets/example_config.conf");
const INADMISSIBLE_CHARS: &[char] = &['@', '/', '.'];

/// Template with `source` and `dest_prefix` filled in
fn render(name: &str, source: Option<&str>) -> String {
    let mut lines: Vec<String> = TEMPLATE
        .lines()
        .map(|line| {
            let line = line.trim();
            match source {
                Some(source) if line.starts_with("source =") => format!("source = {source}"),
                _ if line.starts_with("dest_prefix =") => {
                    format!("dest_prefix = /.snapshots/@{name}-")
                }
                _ => line.to_string(),
            }
        })
        .collect();
    lines.push(String::new());
    lines.join("\n")
}

pub fn run(name: &str, source: Option<&str>, config_file: Option<&Path>) -> Result<()> {
    if name.contains(INADMISSIBLE_CHARS) {
        anyhow::bail!(
            "Config name should be a file name, without following chars: {}",
            INADMISSIBLE_CHARS.iter().collect::<String>()
        );
    }

    let path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(format!("{name}.conf")));
    if path.exists() {
        eprintln!("Already exists: {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Could not access or create {}; run as root?", parent.display())
        })?;
    }
    fs::write(&path, render(name, source))
        .with_context(|| format!("Could not access or create {}; run as root?", path.display()))?;

    eprintln!();
    eprintln!("{} Created: {}", "✓".green(), path.display());
    if source.is_none() {
        eprintln!("Please edit the file to set 'source = ' field.");
    }
    Ok(())
}
