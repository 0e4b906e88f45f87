//! Per-run backup and log locations inside the workspace

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub const BACKUP_DIR: &str = "backup";
pub const LOG_DIR: &str = "log";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `<workspace>/backup/<module>/<config-stem>_<timestamp>` and the matching
/// `<workspace>/log/<module>/<config-stem>_<timestamp>.log`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub workspace: PathBuf,
    pub run_name: PathBuf,
    pub timestamp: String,
    pub backup_dir: PathBuf,
    pub log_file: PathBuf,
}

impl RunLayout {
    pub fn new(workspace: &Path, module_root: &Path, config_file: &Path, now: DateTime<Local>) -> Self {
        let module_name = module_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "module".to_string());
        let config_stem = config_file
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "config".to_string());
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

        let run_name = PathBuf::from(module_name).join(format!("{config_stem}_{timestamp}"));
        let backup_dir = workspace.join(BACKUP_DIR).join(&run_name);
        let log_file = workspace
            .join(LOG_DIR)
            .join(format!("{}.log", run_name.display()));

        Self {
            workspace: workspace.to_path_buf(),
            run_name,
            timestamp,
            backup_dir,
            log_file,
        }
    }

    /// Default workspace when none is given on the command line
    pub fn default_workspace() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("rustle-provision")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout_paths() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let layout = RunLayout::new(
            Path::new("/var/lib/provision"),
            Path::new("/srv/modules/nginx"),
            Path::new("/etc/provision/prod.yml"),
            now,
        );

        assert_eq!(layout.timestamp, "20240309140507");
        assert_eq!(
            layout.backup_dir,
            PathBuf::from("/var/lib/provision/backup/nginx/prod_20240309140507")
        );
        assert_eq!(
            layout.log_file,
            PathBuf::from("/var/lib/provision/log/nginx/prod_20240309140507.log")
        );
    }
}
