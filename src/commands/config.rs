use crate::ServerContext;
use super::ArgSlice;

pub async fn show(
    _args: ArgSlice<'_>,
    state: &ServerContext,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(toml::to_string_pretty(state.config.as_ref())?)
}

pub async fn path(
    _args: ArgSlice<'_>,
    state: &ServerContext,
) -> Result<String, Box<dyn std::error::Error>> {
    let output_dir = &state.config.output_dir;
    let absolute = std::fs::canonicalize(output_dir)?;
    Ok(format!("{} ({})", output_dir.display(), absolute.display()))
}
