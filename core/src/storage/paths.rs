use log::debug;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// How run artifacts are laid out under the base directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingPolicy {
    /// One subdirectory per run instead of run ids embedded in file names.
    pub make_subdir: bool,
    /// Subdirectory name stem, followed by the padded run id.
    pub dir_prefix: String,
    pub run_zfill: usize,
    pub trigger_zfill: usize,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            make_subdir: true,
            dir_prefix: "run".to_string(),
            run_zfill: 3,
            trigger_zfill: 5,
        }
    }
}

fn zfill(value: usize, width: usize) -> String {
    format!("{value:0width$}")
}

/// Maps window indices onto run directories.
#[derive(Debug, Clone)]
pub struct RunPathResolver {
    base: PathBuf,
    policy: NamingPolicy,
}

impl RunPathResolver {
    pub fn new<P: Into<PathBuf>>(base: P, policy: NamingPolicy) -> Self {
        Self {
            base: base.into(),
            policy,
        }
    }

    /// Directory holding a run's artifacts, without touching the filesystem.
    pub fn run_directory(&self, run_id: usize) -> PathBuf {
        if self.policy.make_subdir {
            let name = format!(
                "{}{}",
                self.policy.dir_prefix,
                zfill(run_id, self.policy.run_zfill)
            );
            self.base.join(name)
        } else {
            self.base.clone()
        }
    }

    /// Resolves the run directory, creating the per-run subdirectory if needed.
    pub fn prepare(&self, run_id: usize) -> io::Result<RunContext> {
        let context = self.context(run_id);
        if self.policy.make_subdir && !context.directory.exists() {
            debug!("creating run directory {}", context.directory.display());
            fs::create_dir_all(&context.directory)?;
        }
        Ok(context)
    }

    /// Same as [`Self::prepare`] but never creates anything.
    pub fn context(&self, run_id: usize) -> RunContext {
        RunContext {
            run_id,
            directory: self.run_directory(run_id),
            policy: self.policy.clone(),
        }
    }
}

/// Paths for one active window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_id: usize,
    directory: PathBuf,
    policy: NamingPolicy,
}

impl RunContext {
    pub fn run_id(&self) -> usize {
        self.run_id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn run_tag(&self) -> String {
        zfill(self.run_id, self.policy.run_zfill)
    }

    pub fn sweep_data_path(&self) -> PathBuf {
        if self.policy.make_subdir {
            self.directory.join("swp.rawdata")
        } else {
            self.directory.join(format!("swp{}.rawdata", self.run_tag()))
        }
    }

    pub fn sweep_plot_path(&self, channel: usize) -> PathBuf {
        if self.policy.make_subdir {
            self.directory.join(format!("swp_{channel:03}.png"))
        } else {
            self.directory
                .join(format!("swp{}_{channel:03}.png", self.run_tag()))
        }
    }

    pub fn trigger_data_path(&self, trigger_index: usize) -> PathBuf {
        let index = zfill(trigger_index, self.policy.trigger_zfill);
        if self.policy.make_subdir {
            self.directory.join(format!("trg_{index}.rawdata"))
        } else {
            self.directory
                .join(format!("trg{}_{index}.rawdata", self.run_tag()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn policy(make_subdir: bool) -> NamingPolicy {
        NamingPolicy {
            make_subdir,
            dir_prefix: "obs".into(),
            run_zfill: 2,
            trigger_zfill: 4,
        }
    }

    #[test]
    fn subdir_mode_uses_fixed_names() {
        let base = tempdir().unwrap();
        let resolver = RunPathResolver::new(base.path(), policy(true));
        let context = resolver.prepare(2).unwrap();

        assert!(context.directory().is_dir());
        assert!(context.directory().to_string_lossy().ends_with("02"));
        assert_eq!(context.directory(), base.path().join("obs02"));
        assert_eq!(context.sweep_data_path(), base.path().join("obs02/swp.rawdata"));
        assert_eq!(context.sweep_plot_path(7), base.path().join("obs02/swp_007.png"));
        assert_eq!(
            context.trigger_data_path(12),
            base.path().join("obs02/trg_0012.rawdata")
        );
    }

    #[test]
    fn flat_mode_embeds_run_id() {
        let base = tempdir().unwrap();
        let resolver = RunPathResolver::new(base.path(), policy(false));
        let context = resolver.prepare(2).unwrap();

        assert_eq!(context.directory(), base.path());
        assert_eq!(context.sweep_data_path(), base.path().join("swp02.rawdata"));
        assert_eq!(context.sweep_plot_path(7), base.path().join("swp02_007.png"));
        assert_eq!(
            context.trigger_data_path(12),
            base.path().join("trg02_0012.rawdata")
        );
    }

    #[test]
    fn prepare_keeps_existing_directory() {
        let base = tempdir().unwrap();
        let resolver = RunPathResolver::new(base.path(), policy(true));
        std::fs::create_dir(base.path().join("obs05")).unwrap();
        std::fs::write(base.path().join("obs05/keep.txt"), b"x").unwrap();

        let context = resolver.prepare(5).unwrap();
        assert!(context.directory().join("keep.txt").exists());
    }

    #[test]
    fn context_does_not_create_directories() {
        let base = tempdir().unwrap();
        let resolver = RunPathResolver::new(base.path(), policy(true));
        let context = resolver.context(1);
        assert!(!context.directory().exists());
        assert_eq!(context.run_id(), 1);
    }

    #[test]
    fn wide_run_ids_are_not_truncated() {
        let resolver = RunPathResolver::new("/data", policy(false));
        assert_eq!(
            resolver.context(123).sweep_data_path(),
            PathBuf::from("/data/swp123.rawdata")
        );
    }
}
