//! Kubernetes manifests applied with kubectl
//!
//! Kustomizations may pin images to tags produced by other components; the
//! tags are written into the kustomization with `kustomize edit set image`
//! before kubectl runs.

use super::{Cmd, Driver, Step};
use crate::Result;
use rollout_config::Kubernetes;
use std::path::Path;

/// Driver applying the manifests at `config.path` below `dir`
pub fn driver(dir: &Path, config: &Kubernetes) -> Result<Driver> {
    let path = dir.join(&config.path);

    let mut set_images = Step::new("kustomize-edit-set-image");
    for image in &config.images {
        let new_name = if image.new_name.is_empty() {
            &image.name
        } else {
            &image.new_name
        };
        set_images = set_images.run(
            Cmd::new("kustomize-edit-set-image", "kustomize", &path)
                .args(["edit", "set", "image"])
                .output_arg(format!("{}={}:", image.name, new_name), &image.new_tag_from)?,
        );
    }

    let kubectl = |name: &str, dry_run: bool| {
        let mut cmd = Cmd::new(name, "kubectl", dir);
        if !config.context.is_empty() {
            cmd = cmd.args(["--context", config.context.as_str()]);
        }
        if !config.namespace.is_empty() {
            cmd = cmd.args(["--namespace", config.namespace.as_str()]);
        }
        cmd = cmd.arg("apply");
        if dry_run {
            cmd = cmd.arg("--dry-run=server");
        }
        let flag = if config.kustomize { "-k" } else { "-f" };
        cmd.arg(flag).arg(path.display().to_string())
    };

    let mut diff = Vec::new();
    let mut apply = Vec::new();
    if !set_images.run.is_empty() {
        diff.push(set_images.clone());
        apply.push(set_images);
    }
    diff.push(Step::cmd(kubectl("kubectl-apply-dry-run", true)));
    apply.push(Step::cmd(kubectl("kubectl-apply", false)));

    Ok(Driver {
        kind: "kubernetes",
        diff,
        apply,
        collector: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Arg, OutputRef};
    use rollout_config::KustomizeImage;

    fn literals(cmd: &Cmd) -> Vec<String> {
        cmd.args
            .iter()
            .map(|arg| match arg {
                Arg::Literal(s) => s.clone(),
                Arg::Output { prefix, reference } => format!("{}<{}>", prefix, reference),
            })
            .collect()
    }

    #[test]
    fn test_plain_manifests() {
        let config = Kubernetes {
            path: "manifests".to_string(),
            namespace: "web".to_string(),
            ..Default::default()
        };
        let driver = driver(Path::new("/deploy"), &config).unwrap();

        assert_eq!(driver.diff.len(), 1);
        assert_eq!(
            literals(&driver.diff[0].run[0]),
            [
                "--namespace",
                "web",
                "apply",
                "--dry-run=server",
                "-f",
                "/deploy/manifests"
            ]
        );
        assert_eq!(
            literals(&driver.apply[0].run[0]),
            ["--namespace", "web", "apply", "-f", "/deploy/manifests"]
        );
    }

    #[test]
    fn test_kustomize_images() {
        let config = Kubernetes {
            path: "overlays/prod".to_string(),
            kustomize: true,
            context: "prod-cluster".to_string(),
            images: vec![KustomizeImage {
                name: "myapp".to_string(),
                new_name: "registry/myapp".to_string(),
                new_tag_from: "image.tag".to_string(),
            }],
            ..Default::default()
        };
        let driver = driver(Path::new("/deploy"), &config).unwrap();

        assert_eq!(driver.apply.len(), 2);
        let edit = &driver.apply[0].run[0];
        assert_eq!(edit.program, "kustomize");
        assert_eq!(edit.dir, Path::new("/deploy/overlays/prod"));
        assert_eq!(
            edit.args.last(),
            Some(&Arg::Output {
                prefix: "myapp=registry/myapp:".to_string(),
                reference: OutputRef::parse("image.tag").unwrap(),
            })
        );
        assert_eq!(
            literals(&driver.apply[1].run[0]),
            [
                "--context",
                "prod-cluster",
                "apply",
                "-k",
                "/deploy/overlays/prod"
            ]
        );
    }
}
