use clap::Args;

use dockhand::project::Project;

pub type CmdResult<T> = dockhand::Result<(T, i32)>;

/// Flags shared by every subcommand: where the project lives, property
/// overrides, and the global verbose switch.
#[derive(Args, Debug, Default)]
pub struct SharedArgs {
    /// Project directory containing dockhand.json
    #[arg(long, default_value = ".")]
    pub project_dir: String,

    /// Override a project property (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Log captured output of failing external commands
    #[arg(long)]
    pub verbose: bool,
}

/// Load the project and apply command-line overrides. Overrides land
/// before stage defaulting, so set-if-unset never clobbers them.
pub(crate) fn load_project(shared: &SharedArgs) -> dockhand::Result<Project> {
    let mut project = Project::load(&shared.project_dir)?;
    project.apply_overrides(&shared.set)?;
    if shared.verbose {
        project.set("verbose", true);
    }
    Ok(project)
}

pub mod config;
pub mod package;
pub mod push;
