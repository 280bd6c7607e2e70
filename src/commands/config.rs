use clap::Args;
use dockhand::{package, push};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::commands::{load_project, CmdResult, SharedArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub shared: SharedArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOutput {
    pub name: String,
    pub version: String,
    pub properties: Map<String, Value>,
}

/// Show the effective configuration after both stages' defaulting.
pub fn run(args: ConfigArgs) -> CmdResult<ConfigOutput> {
    let mut project = load_project(&args.shared)?;
    package::apply_defaults(&mut project);
    push::apply_defaults(&mut project);

    Ok((
        ConfigOutput {
            name: project.name.clone(),
            version: project.version.clone(),
            properties: project.properties().clone(),
        },
        0,
    ))
}
