//! Package stage: two-stage docker build around the distributable archive.
//!
//! Stage one builds an intermediate image from the project's docker
//! build context. Stage two assembles a generated Dockerfile plus the
//! copied dist archive and builds the final, locally tagged image.
//! Both stages run even when no push follows.

use serde::Serialize;
use std::path::PathBuf;

use crate::dockerfile;
use crate::error::Result;
use crate::executor::{verify_can_execute, Execution, ExternalCommand};
use crate::project::Project;
use crate::utils::io;

pub const TEMP_IMAGE_PREFIX: &str = "dockhand-temp";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutput {
    pub image: String,
    pub temp_image: String,
    pub build_dir: String,
    pub assembly_dir: String,
    pub dist_file: String,
}

/// Apply set-if-unset defaults for the package stage.
pub fn apply_defaults(project: &mut Project) {
    let name = project.name.clone();
    let version = project.version.clone();

    project.set_if_unset("docker_package_build_dir", "src/main/docker");
    project.set_if_unset(
        "docker_package_build_image",
        format!("{}:{}", name, version),
    );
    project.set_if_unset("docker_package_build_version", version.clone());
    project.set_if_unset(
        "docker_package_dist_file",
        format!("{}-{}.tar.gz", name, version),
    );
    project.set_if_unset("docker_package_image_maintainer", "anonymous");
    project.set_if_unset(
        "docker_package_prepare_env_cmd",
        "echo 'no prepare_env_cmd configured'",
    );
    let dist_file = project.get_str_or("docker_package_dist_file", "");
    project.set_if_unset(
        "docker_package_package_cmd",
        format!("pip install {}", dist_file),
    );

    let verbose = project.get_bool_or("verbose", false);
    project.set_if_unset("docker_package_verbose_output", verbose);
}

pub fn temp_image(project: &Project) -> String {
    format!(
        "{}-{}:{}",
        TEMP_IMAGE_PREFIX, project.name, project.version
    )
}

pub fn build_image(project: &Project) -> String {
    project.get_str_or(
        "docker_package_build_image",
        &format!("{}:{}", project.name, project.version),
    )
}

pub fn run(project: &mut Project) -> Result<PackageOutput> {
    apply_defaults(project);
    verify_can_execute("docker", "package")?;

    let project = &*project;
    let exec = Execution::new(project, "package", "docker_package_verbose_output");

    let temp_img = temp_image(project);
    let build_img = build_image(project);
    let build_dir = project.expand_path(&project.get_str_or("docker_package_build_dir", ""));
    let build_version = project.get_str_or("docker_package_build_version", &project.version);

    let cmd = ExternalCommand::new("docker")
        .arg("build")
        .arg("--build-arg")
        .arg(format!("buildVersion={}", build_version))
        .arg("-t")
        .arg(&temp_img)
        .arg(build_dir.display().to_string());
    exec.run_checked(
        &cmd,
        "docker_package_build",
        Some(&format!(
            "Executing primary stage docker build for image - {}",
            build_img
        )),
        "Error building primary stage docker image",
        false,
    )?;

    let assembly_dir = assemble(project, &temp_img)?;

    let cmd = ExternalCommand::new("docker")
        .arg("build")
        .arg("-t")
        .arg(&build_img)
        .arg(assembly_dir.display().to_string());
    exec.run_checked(
        &cmd,
        "docker_package_img",
        Some(&format!(
            "Executing secondary stage docker build for image - {}",
            build_img
        )),
        "Error building docker image",
        false,
    )?;

    log_status!(
        "package",
        "Finished building docker image - {} - from {}",
        build_img,
        assembly_dir.display()
    );

    Ok(PackageOutput {
        image: build_img,
        temp_image: temp_img,
        build_dir: build_dir.display().to_string(),
        assembly_dir: assembly_dir.display().to_string(),
        dist_file: project.get_str_or("docker_package_dist_file", ""),
    })
}

/// Synthesize the stage-two build context: write the Dockerfile
/// (executable) and copy the dist archive next to it so the COPY
/// directive resolves. Returns the assembly directory.
pub(crate) fn assemble(project: &Project, temp_img: &str) -> Result<PathBuf> {
    let assembly_dir = project.dist_dir().join("docker");
    io::ensure_dir(&assembly_dir)?;

    let dist_file = project.get_str_or("docker_package_dist_file", "");
    let content = dockerfile::render(
        temp_img,
        &project.get_str_or("docker_package_image_maintainer", "anonymous"),
        &dist_file,
        &project.get_str_or("docker_package_prepare_env_cmd", ""),
        &project.get_str_or("docker_package_package_cmd", ""),
    );
    io::write_executable(&assembly_dir.join("Dockerfile"), &content)?;

    io::copy_file(
        &project.dist_dir().join(&dist_file),
        &assembly_dir.join(&dist_file),
    )?;

    Ok(assembly_dir)
}
