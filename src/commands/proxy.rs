use axum::http::Uri;
use crate::ServerContext;
use crate::config::find_rule;
use super::ArgSlice;

pub async fn list(
    _args: ArgSlice<'_>,
    state: &ServerContext,
) -> Result<String, Box<dyn std::error::Error>> {
    if state.rules.is_empty() {
        return Ok(String::from("no proxy rules configured"));
    }
    let lines: Vec<String> = state
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {rule}", i + 1))
        .collect();
    Ok(lines.join("\n"))
}

pub async fn test(
    args: ArgSlice<'_>,
    state: &ServerContext,
) -> Result<String, Box<dyn std::error::Error>> {
    let Some(path) = args.first() else {
        return Err("usage: proxy test [path]".into());
    };
    let uri: Uri = path.parse()?;
    match find_rule(&state.rules, uri.path()) {
        Some(rule) if rule.fallback_only => Ok(format!(
            "{} if not served locally, else served from {}",
            rule.forward_uri(&uri)?,
            state.config.output_dir.display()
        )),
        Some(rule) => Ok(format!("{} (rule {})", rule.forward_uri(&uri)?, rule.pattern)),
        None => Ok(format!("served from {}", state.config.output_dir.display())),
    }
}
