//! The synthetic git job
//!
//! Exposes the checked-out commit as outputs so that other components can
//! tag images or pass versions with `git.sha` and `git.tag`.

use super::{CollectContext, Driver, Op, OutputCollector, Outputs};
use crate::Result;
use async_trait::async_trait;
use command_executor::Command;
use std::path::{Path, PathBuf};

/// Driver of the git job rooted at `dir`
pub fn driver(dir: &Path) -> Driver {
    Driver::empty("git").with_collector(GitCollector {
        dir: dir.to_path_buf(),
    })
}

struct GitCollector {
    dir: PathBuf,
}

#[async_trait]
impl OutputCollector for GitCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, _op: Op, outputs: &mut Outputs) -> Result<()> {
        let sha = ctx
            .runtime
            .output(
                Command::builder("git")
                    .args(["rev-parse", "HEAD"])
                    .current_dir(&self.dir)
                    .build(),
            )
            .await?;

        let tags = ctx
            .runtime
            .output(
                Command::builder("git")
                    .args(["tag", "--points-at", "HEAD"])
                    .current_dir(&self.dir)
                    .build(),
            )
            .await?;

        outputs.insert("sha".to_string(), sha.trim().to_string());
        outputs.insert(
            "tag".to_string(),
            tags.lines().next().unwrap_or_default().trim().to_string(),
        );
        Ok(())
    }
}
