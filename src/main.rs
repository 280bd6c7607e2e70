use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, package, push};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(version = VERSION)]
#[command(about = "Package a distributable archive into a docker image and push it to a registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the dist archive into a locally tagged docker image
    Package(package::PackageArgs),
    /// Build the image and push it to the configured registry
    Push(push::PushArgs),
    /// Show the resolved project configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = match cli.command {
        Commands::Package(args) => output::map_cmd_result_to_json(package::run(args)),
        Commands::Push(args) => output::map_cmd_result_to_json(push::run(args)),
        Commands::Config(args) => output::map_cmd_result_to_json(config::run(args)),
    };

    let _ = output::print_json_result(json_result);
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
