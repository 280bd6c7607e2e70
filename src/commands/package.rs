use clap::Args;
use dockhand::package;

use crate::commands::{load_project, CmdResult, SharedArgs};

#[derive(Args)]
pub struct PackageArgs {
    #[command(flatten)]
    pub shared: SharedArgs,
}

pub fn run(args: PackageArgs) -> CmdResult<package::PackageOutput> {
    let mut project = load_project(&args.shared)?;
    let output = package::run(&mut project)?;
    Ok((output, 0))
}
