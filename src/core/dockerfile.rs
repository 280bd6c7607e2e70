//! Build-descriptor rendering for the secondary stage image.

/// Render the Dockerfile assembled next to the copied dist archive.
/// The layout is fixed: one FROM, one MAINTAINER, one COPY and the two
/// RUN directives (environment prep, then package install).
pub fn render(
    base_image: &str,
    maintainer: &str,
    dist_file: &str,
    prepare_env_cmd: &str,
    package_cmd: &str,
) -> String {
    format!(
        "FROM {base_image}\n\
         MAINTAINER {maintainer}\n\
         COPY {dist_file} .\n\
         RUN {prepare_env_cmd}\n\
         RUN {package_cmd}\n"
    )
}
