//! Push stage: registry authentication, tag/push fan-out, and the
//! artifact manifest.
//!
//! Ordering is part of the contract: authentication happens before any
//! tag or push, every tag is pushed before the manifest is written, and
//! the manifest always records the version-scoped registry path rather
//! than any single tag. There is no rollback for partially pushed tag
//! sets.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::executor::{Execution, ExternalCommand};
use crate::package;
use crate::project::Project;
use crate::utils::io;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutput {
    pub registry: String,
    pub registry_path: String,
    pub tags: Vec<String>,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactManifest {
    #[serde(rename = "artifact-type")]
    pub artifact_type: String,
    #[serde(rename = "artifact-path")]
    pub artifact_path: String,
    #[serde(rename = "artifact-identifier")]
    pub artifact_identifier: String,
}

/// Apply set-if-unset defaults for the push stage.
pub fn apply_defaults(project: &mut Project) {
    let verbose = project.get_bool_or("verbose", false);
    project.set_if_unset("docker_push_verbose_output", verbose);
    project.set_if_unset("docker_push_tag_as_latest", true);
    project.set_if_unset("ensure_ecr_registry_created", true);
}

pub fn run(project: &mut Project) -> Result<PushOutput> {
    apply_defaults(project);

    let project = &*project;
    let exec = Execution::new(project, "push", "docker_push_verbose_output");

    let registry = project.get_mandatory("docker_push_registry")?;
    let local_img = package::build_image(project);
    let fq_artifact = project.get_str_or("docker_push_img", &local_img);
    let registry_path = format!("{}/{}", registry, fq_artifact);

    if uses_ecr(&registry) {
        prep_ecr(project, &exec, &registry, &fq_artifact)?;
    }

    let tags = resolve_tags(
        &project.version,
        project.get_bool_or("docker_push_tag_as_latest", true),
    );
    for tag in &tags {
        let remote_img = format!("{}:{}", project.name, tag);
        tag_image(&exec, &local_img, &remote_img)?;
        push_image(&exec, &remote_img)?;
    }

    let manifest_path = write_manifest(project, &registry_path)?;

    Ok(PushOutput {
        registry,
        registry_path,
        tags,
        manifest_path: manifest_path.display().to_string(),
    })
}

/// Substring match preserved from the original contract. Registries
/// that merely contain "ecr" in their hostname also match.
pub(crate) fn uses_ecr(registry: &str) -> bool {
    registry.contains("ecr")
}

/// Tag set is the version, plus `latest` when enabled. Push order
/// matches this order.
pub(crate) fn resolve_tags(version: &str, tag_as_latest: bool) -> Vec<String> {
    let mut tags = vec![version.to_string()];
    if tag_as_latest {
        tags.push("latest".to_string());
    }
    tags
}

fn prep_ecr(
    project: &Project,
    exec: &Execution,
    registry: &str,
    fq_artifact: &str,
) -> Result<()> {
    ecr_login(exec, registry)?;
    if project.get_bool_or("ensure_ecr_registry_created", true) {
        ensure_repository(exec, fq_artifact)?;
    }
    Ok(())
}

fn ecr_login(exec: &Execution, registry: &str) -> Result<()> {
    let cmd = ExternalCommand::new("aws").args([
        "ecr",
        "get-authorization-token",
        "--output",
        "text",
        "--query",
        "authorizationData[].authorizationToken",
    ]);
    let result = exec.run_checked(&cmd, "docker_ecr_get_token", None, "Error getting token", false)?;

    let token = result
        .stdout_lines
        .first()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| Error::registry_auth_failed("Authorization token response was empty"))?;
    let (username, password) = decode_auth_token(token)?;

    let cmd = ExternalCommand::new("docker")
        .arg("login")
        .arg("-u")
        .arg(username)
        .arg("-p")
        .arg(password)
        .arg(registry);
    exec.run_checked(
        &cmd,
        "docker_ecr_docker_login",
        None,
        "Error authenticating",
        false,
    )?;
    Ok(())
}

/// Decode the base64 authorization token and split it on the first
/// colon into username and password.
pub(crate) fn decode_auth_token(token: &str) -> Result<(String, String)> {
    let decoded = BASE64
        .decode(token)
        .map_err(|e| Error::registry_auth_failed(format!("Token is not valid base64: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| Error::registry_auth_failed("Decoded token is not valid UTF-8"))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| Error::registry_auth_failed("Decoded token has no user:password separator"))?;
    Ok((username.to_string(), password.to_string()))
}

/// Probe-then-create: the existence probe is non-fatal, only a failed
/// create aborts. Returns whether the repository was created.
fn ensure_repository(exec: &Execution, fq_artifact: &str) -> Result<bool> {
    let probe = ExternalCommand::new("aws").args([
        "ecr",
        "describe-repositories",
        "--repository-names",
        fq_artifact,
    ]);
    let create = ExternalCommand::new("aws").args([
        "ecr",
        "create-repository",
        "--repository-name",
        fq_artifact,
    ]);
    probe_then_create(
        exec,
        &probe,
        &create,
        "docker_ecr_registry_discover",
        "docker_ecr_registry_create",
        "Unable to create ecr registry",
    )
}

pub(crate) fn probe_then_create(
    exec: &Execution,
    probe: &ExternalCommand,
    create: &ExternalCommand,
    probe_report: &str,
    create_report: &str,
    error_message: &str,
) -> Result<bool> {
    if exec.probe(probe, probe_report)?.is_some() {
        return Ok(false);
    }
    exec.run_checked(create, create_report, None, error_message, false)?;
    Ok(true)
}

fn tag_image(exec: &Execution, local_img: &str, remote_img: &str) -> Result<()> {
    let cmd = ExternalCommand::new("docker")
        .arg("tag")
        .arg(local_img)
        .arg(remote_img);
    exec.run_checked(
        &cmd,
        "docker_push_tag",
        Some(&format!(
            "Tagging local docker image {} - {}",
            local_img, remote_img
        )),
        &format!("Error tagging image to remote registry - {}", remote_img),
        false,
    )?;
    Ok(())
}

fn push_image(exec: &Execution, remote_img: &str) -> Result<()> {
    let cmd = ExternalCommand::new("docker").arg("push").arg(remote_img);
    // Push failures log their diagnostics regardless of verbosity.
    exec.run_checked(
        &cmd,
        "docker_push_img",
        Some(&format!("Pushing remote docker image - {}", remote_img)),
        &format!("Error pushing image to remote registry - {}", remote_img),
        true,
    )?;
    Ok(())
}

/// Serialize the artifact manifest to `target/artifact.json`,
/// overwriting any previous manifest.
pub(crate) fn write_manifest(project: &Project, registry_path: &str) -> Result<PathBuf> {
    let manifest = ArtifactManifest {
        artifact_type: "container".to_string(),
        artifact_path: registry_path.to_string(),
        artifact_identifier: project.version.clone(),
    };

    let target_dir = project.target_dir();
    io::ensure_dir(&target_dir)?;
    let path = target_dir.join("artifact.json");

    let content = serde_json::to_string(&manifest)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize manifest".to_string())))?;
    std::fs::write(&path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(dir: &TempDir) -> Project {
        Project::from_parts("proj", "1.2.3", dir.path())
    }

    #[cfg(unix)]
    fn write_stub(dir: &std::path::Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    // Stub-path tests rewrite PATH for the whole process; serialize them.
    #[cfg(unix)]
    static PATH_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[cfg(unix)]
    fn with_stub_path(bin_dir: &std::path::Path, f: impl FnOnce()) {
        let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{}", bin_dir.display(), original));
        f();
        std::env::set_var("PATH", original);
    }

    #[test]
    fn tag_set_is_version_then_latest() {
        assert_eq!(resolve_tags("1.2.3", true), vec!["1.2.3", "latest"]);
        assert_eq!(resolve_tags("1.2.3", false), vec!["1.2.3"]);
    }

    #[test]
    fn ecr_detection_is_substring_match() {
        assert!(uses_ecr("123456789012.dkr.ecr.us-west-2.amazonaws.com"));
        assert!(!uses_ecr("myregistry.example.com"));
        // Known ambiguity, preserved behavior: any "ecr" substring matches.
        assert!(uses_ecr("secrets.example.com"));
    }

    #[test]
    fn auth_token_splits_on_first_colon() {
        let token = BASE64.encode("AWS:se:cr:et");
        let (user, pass) = decode_auth_token(&token).unwrap();
        assert_eq!(user, "AWS");
        assert_eq!(pass, "se:cr:et");
    }

    #[test]
    fn auth_token_without_separator_is_rejected() {
        let token = BASE64.encode("no-separator");
        let err = decode_auth_token(&token).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RegistryAuthFailed);

        let err = decode_auth_token("!!!not-base64!!!").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RegistryAuthFailed);
    }

    #[test]
    fn manifest_matches_published_artifact() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);

        let path = write_manifest(&project, "myregistry.example.com/proj:1.2.3").unwrap();
        assert_eq!(path, dir.path().join("target/artifact.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "artifact-type": "container",
                "artifact-path": "myregistry.example.com/proj:1.2.3",
                "artifact-identifier": "1.2.3",
            })
        );
    }

    #[test]
    fn manifest_reflects_registry_path_not_tags() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);

        // Tag set and manifest are derived independently: the manifest
        // carries the registry path even when latest was also pushed.
        let tags = resolve_tags(&project.version, true);
        assert_eq!(tags, vec!["1.2.3", "latest"]);

        let path = write_manifest(&project, "myregistry.example.com/proj:1.2.3").unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            written["artifact-path"],
            "myregistry.example.com/proj:1.2.3"
        );
        assert_eq!(written["artifact-identifier"], "1.2.3");
    }

    #[test]
    fn probe_then_create_creates_on_missing() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let exec = Execution::new(&project, "push", "docker_push_verbose_output");

        let probe = ExternalCommand::new("sh").arg("-c").arg("exit 1");
        let create = ExternalCommand::new("sh").arg("-c").arg("exit 0");
        let created =
            probe_then_create(&exec, &probe, &create, "discover", "create", "create failed")
                .unwrap();
        assert!(created);
    }

    #[test]
    fn probe_then_create_skips_create_when_present() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let exec = Execution::new(&project, "push", "docker_push_verbose_output");

        let probe = ExternalCommand::new("sh").arg("-c").arg("exit 0");
        // A create that would fail proves it is never invoked.
        let create = ExternalCommand::new("sh").arg("-c").arg("exit 1");
        let created =
            probe_then_create(&exec, &probe, &create, "discover", "create", "create failed")
                .unwrap();
        assert!(!created);
    }

    #[test]
    fn probe_then_create_fails_when_create_fails() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let exec = Execution::new(&project, "push", "docker_push_verbose_output");

        let probe = ExternalCommand::new("sh").arg("-c").arg("exit 1");
        let create = ExternalCommand::new("sh").arg("-c").arg("exit 1");
        let err =
            probe_then_create(&exec, &probe, &create, "discover", "create", "create failed")
                .unwrap_err();
        assert_eq!(err.message, "create failed");
    }

    #[cfg(unix)]
    #[test]
    fn ecr_push_authenticates_and_creates_before_any_tag_or_push() {
        let dir = TempDir::new().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let log = dir.path().join("invocations.log");

        write_stub(
            &bin_dir,
            "docker",
            &format!("#!/bin/sh\necho \"docker $*\" >> {}\nexit 0\n", log.display()),
        );
        // Token is base64("AWS:secret"); describe-repositories reports
        // the repository as absent to force the create path.
        write_stub(
            &bin_dir,
            "aws",
            &format!(
                "#!/bin/sh\n\
                 echo \"aws $*\" >> {log}\n\
                 if [ \"$2\" = get-authorization-token ]; then echo QVdTOnNlY3JldA==; fi\n\
                 if [ \"$2\" = describe-repositories ]; then exit 1; fi\n\
                 exit 0\n",
                log = log.display()
            ),
        );

        let mut project = project(&dir);
        project.set(
            "docker_push_registry",
            "123456789012.dkr.ecr.us-west-2.amazonaws.com",
        );

        with_stub_path(&bin_dir, || {
            let output = run(&mut project).unwrap();
            assert_eq!(output.tags, vec!["1.2.3", "latest"]);
        });

        let recorded = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(
            lines,
            vec![
                "aws ecr get-authorization-token --output text --query authorizationData[].authorizationToken",
                "docker login -u AWS -p secret 123456789012.dkr.ecr.us-west-2.amazonaws.com",
                "aws ecr describe-repositories --repository-names proj:1.2.3",
                "aws ecr create-repository --repository-name proj:1.2.3",
                "docker tag proj:1.2.3 proj:1.2.3",
                "docker push proj:1.2.3",
                "docker tag proj:1.2.3 proj:latest",
                "docker push proj:latest",
            ]
        );
        assert!(dir.path().join("target/artifact.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_push_aborts_remaining_tags_and_skips_manifest() {
        let dir = TempDir::new().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let log = dir.path().join("invocations.log");

        write_stub(
            &bin_dir,
            "docker",
            &format!(
                "#!/bin/sh\n\
                 echo \"docker $*\" >> {log}\n\
                 if [ \"$1\" = push ]; then exit 1; fi\n\
                 exit 0\n",
                log = log.display()
            ),
        );

        let mut project = project(&dir);
        project.set("docker_push_registry", "myregistry.example.com");

        with_stub_path(&bin_dir, || {
            let err = run(&mut project).unwrap_err();
            assert_eq!(
                err.message,
                "Error pushing image to remote registry - proj:1.2.3"
            );
        });

        let recorded = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(
            lines,
            vec!["docker tag proj:1.2.3 proj:1.2.3", "docker push proj:1.2.3"]
        );
        assert!(!dir.path().join("target/artifact.json").exists());
    }

    #[test]
    fn missing_registry_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut project = project(&dir);
        let err = run(&mut project).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigMissingKey);
    }
}
