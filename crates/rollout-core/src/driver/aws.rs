//! AWS account check
//!
//! Makes sure the active credentials belong to the configured account before
//! anything depending on this component touches AWS resources.

use super::{CollectContext, Driver, Op, OutputCollector, Outputs};
use crate::{Error, Result};
use async_trait::async_trait;
use command_executor::Command;
use rollout_config::Aws;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Driver verifying the caller identity
pub fn driver(dir: &Path, config: &Aws) -> Driver {
    Driver::empty("aws").with_collector(AccountCheck {
        dir: dir.to_path_buf(),
        account: config.account.clone(),
    })
}

#[derive(Deserialize)]
struct CallerIdentity {
    #[serde(rename = "Account")]
    account: String,
}

struct AccountCheck {
    dir: PathBuf,
    account: String,
}

#[async_trait]
impl OutputCollector for AccountCheck {
    async fn collect(&self, ctx: &CollectContext<'_>, _op: Op, outputs: &mut Outputs) -> Result<()> {
        let stdout = ctx
            .runtime
            .output(
                Command::builder("aws")
                    .args(["sts", "get-caller-identity", "--output", "json"])
                    .current_dir(&self.dir)
                    .build(),
            )
            .await?;

        let identity: CallerIdentity = serde_json::from_str(&stdout).map_err(|e| {
            Error::Output(format!("unable to decode aws sts get-caller-identity output: {}", e))
        })?;

        if identity.account != self.account {
            return Err(Error::Output(format!(
                "aws sts get-caller-identity returned account {:?}, which is different from the one in the config {:?}",
                identity.account, self.account
            )));
        }

        outputs.insert("account".to_string(), identity.account);
        Ok(())
    }
}
