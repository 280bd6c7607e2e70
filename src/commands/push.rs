use clap::Args;
use dockhand::{package, push};
use serde::Serialize;

use crate::commands::{load_project, CmdResult, SharedArgs};

#[derive(Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub shared: SharedArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCommandOutput {
    pub package: package::PackageOutput,
    pub push: push::PushOutput,
}

/// Push depends on package: the image is always (re)built first.
pub fn run(args: PushArgs) -> CmdResult<PushCommandOutput> {
    let mut project = load_project(&args.shared)?;
    let package_output = package::run(&mut project)?;
    let push_output = push::run(&mut project)?;
    Ok((
        PushCommandOutput {
            package: package_output,
            push: push_output,
        },
        0,
    ))
}
