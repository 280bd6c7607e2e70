/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("package", "Executing primary stage docker build for image - {}", image);
/// log_status!("push", "Pushing remote docker image - {}", remote_img);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!("[{}] {}", $prefix, format_args!($($arg)*));
        }
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `dockhand::project` instead of `dockhand::core::project`
pub use core::*;
pub use utils::*;
