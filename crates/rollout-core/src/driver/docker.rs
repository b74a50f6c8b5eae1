//! Container image builds
//!
//! Both operations first check for buildx. With buildx the image is built
//! for `linux/amd64` and either loaded locally (diff) or pushed (apply);
//! without it a plain `docker build` is used, followed by `docker push` on
//! apply.

use super::{CollectContext, Cmd, Driver, Op, OutputCollector, OutputRef, Outputs, Step};
use crate::Result;
use async_trait::async_trait;
use command_executor::Command;
use rollout_config::Docker;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output recording whether `docker buildx` is usable
pub const BUILDX_AVAILABLE: &str = "buildx.available";

const PLATFORM: &str = "linux/amd64";

/// Driver building `config.image` from `dir`
pub fn driver(dir: &Path, config: &Docker) -> Result<Driver> {
    let file = if config.file.is_empty() {
        "Dockerfile"
    } else {
        config.file.as_str()
    };

    let mut tags = Vec::new();
    for tag in &config.tags_from {
        tags.push(OutputRef::parse(tag)?);
    }

    let build = |name: &str, program_args: &[&str]| -> Result<Cmd> {
        let mut cmd = Cmd::new(name, "docker", dir).args(program_args.iter().copied());
        for (key, value) in &config.args {
            cmd = cmd.arg("--build-arg").arg(format!("{}={}", key, value));
        }
        for (key, reference) in &config.args_from {
            cmd = cmd
                .arg("--build-arg")
                .output_arg(format!("{}=", key), reference)?;
        }
        cmd = cmd.args(["-t", config.image.as_str()]);
        for tag in &config.tags_from {
            cmd = cmd.arg("-t").output_arg(format!("{}:", config.image), tag)?;
        }
        Ok(cmd.args(["-f", file, "."]))
    };

    let check = Step::new("docker-buildx-check").collect(BuildxCheck {
        dir: dir.to_path_buf(),
    });

    let diff = vec![
        check.clone(),
        Step::cmd(build(
            "docker-buildx-build",
            &["buildx", "build", "--load", "--platform", PLATFORM],
        )?)
        .when(BUILDX_AVAILABLE, "true"),
        Step::cmd(build("docker-build", &["build"])?).when(BUILDX_AVAILABLE, "false"),
    ];

    let apply = vec![
        check,
        Step::cmd(build(
            "docker-buildx-push",
            &["buildx", "build", "--push", "--platform", PLATFORM],
        )?)
        .when(BUILDX_AVAILABLE, "true"),
        Step::new("docker-build-push")
            .when(BUILDX_AVAILABLE, "false")
            .run(build("docker-build", &["build"])?)
            .run(Cmd::new("docker-push", "docker", dir).args(["push", "--all-tags", config.image.as_str()])),
    ];

    Ok(Driver {
        kind: "docker",
        diff,
        apply,
        collector: None,
    }
    .with_collector(ImageCollector {
        dir: dir.to_path_buf(),
        image: config.image.clone(),
        tags,
    }))
}

struct BuildxCheck {
    dir: PathBuf,
}

#[async_trait]
impl OutputCollector for BuildxCheck {
    async fn collect(&self, ctx: &CollectContext<'_>, _op: Op, outputs: &mut Outputs) -> Result<()> {
        let check = Command::builder("docker")
            .args(["buildx", "inspect"])
            .current_dir(&self.dir)
            .build();
        let available = match ctx.runtime.output(check).await {
            Ok(_) => true,
            Err(e) => {
                debug!("docker buildx is not available: {}", e);
                false
            }
        };
        outputs.insert(BUILDX_AVAILABLE.to_string(), available.to_string());
        Ok(())
    }
}

struct ImageCollector {
    dir: PathBuf,
    image: String,
    tags: Vec<OutputRef>,
}

#[async_trait]
impl OutputCollector for ImageCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, op: Op, outputs: &mut Outputs) -> Result<()> {
        let inspect = Command::builder("docker")
            .args(["inspect", "--format={{.ID}}", self.image.as_str()])
            .current_dir(&self.dir)
            .build();

        let id = match ctx.runtime.output(inspect).await {
            Ok(id) => id,
            // a buildx push leaves no local image behind
            Err(e) if op == Op::Apply && outputs.get(BUILDX_AVAILABLE).map(String::as_str) == Some("true") => {
                debug!("Image {} not available locally: {}", self.image, e);
                let remote = Command::builder("docker")
                    .args([
                        "buildx",
                        "imagetools",
                        "inspect",
                        self.image.as_str(),
                        "--format",
                        "{{.Manifest.Digest}}",
                    ])
                    .current_dir(&self.dir)
                    .build();
                ctx.runtime.output(remote).await?
            }
            Err(e) => return Err(e),
        };

        outputs.insert("id".to_string(), id.trim().to_string());
        outputs.insert("image".to_string(), self.image.clone());
        if let Some(tag) = self.tags.first() {
            outputs.insert("tag".to_string(), ctx.resolve(tag)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Arg;
    use std::collections::BTreeMap;

    fn config() -> Docker {
        Docker {
            image: "registry/app".to_string(),
            file: String::new(),
            args: BTreeMap::from([("GO_VERSION".to_string(), "1.22".to_string())]),
            args_from: BTreeMap::from([("COMMIT".to_string(), "git.sha".to_string())]),
            tags_from: vec!["git.sha".to_string()],
        }
    }

    #[test]
    fn test_diff_steps() {
        let driver = driver(Path::new("/src"), &config()).unwrap();
        let names: Vec<_> = driver.diff.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["docker-buildx-check", "docker-buildx-build", "docker-build"]);
        assert!(driver.diff[0].collector.is_some());
        assert!(driver.diff[0].if_output_eq.is_none());
        assert_eq!(
            driver.diff[1].if_output_eq.as_ref().map(|g| g.value.as_str()),
            Some("true")
        );

        let build = &driver.diff[2].run[0];
        assert_eq!(build.program, "docker");
        assert_eq!(build.dir, Path::new("/src"));
        assert_eq!(
            build.args,
            [
                Arg::Literal("build".to_string()),
                Arg::Literal("--build-arg".to_string()),
                Arg::Literal("GO_VERSION=1.22".to_string()),
                Arg::Literal("--build-arg".to_string()),
                Arg::Output {
                    prefix: "COMMIT=".to_string(),
                    reference: OutputRef::parse("git.sha").unwrap(),
                },
                Arg::Literal("-t".to_string()),
                Arg::Literal("registry/app".to_string()),
                Arg::Literal("-t".to_string()),
                Arg::Output {
                    prefix: "registry/app:".to_string(),
                    reference: OutputRef::parse("git.sha").unwrap(),
                },
                Arg::Literal("-f".to_string()),
                Arg::Literal("Dockerfile".to_string()),
                Arg::Literal(".".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_pushes_without_buildx() {
        let driver = driver(Path::new("/src"), &config()).unwrap();
        let fallback = &driver.apply[2];
        assert_eq!(
            fallback.if_output_eq.as_ref().map(|g| g.value.as_str()),
            Some("false")
        );
        let programs: Vec<_> = fallback.run.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(programs, ["docker-build", "docker-push"]);
    }

    #[test]
    fn test_malformed_tag_reference() {
        let mut config = config();
        config.tags_from = vec!["sha".to_string()];
        assert!(driver(Path::new("."), &config).is_err());
    }
}
