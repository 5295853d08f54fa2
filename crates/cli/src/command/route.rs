use super::{print_json, static_collector, Environment};
use anyhow::{Context, Result};
use router_context::{ContextCollector, StaticCollector, WorkspaceCollector};
use router_engine::{RouteResponse, SuspendedSession};
use router_protocol::{RouteRequest, Urgency};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RouteOptions {
    pub text: String,
    pub urgency: Option<Urgency>,
    pub context: Option<PathBuf>,
    pub root: PathBuf,
    pub save_state: Option<PathBuf>,
}

pub async fn route(env: &Environment, options: RouteOptions) -> Result<()> {
    let collector: Arc<dyn ContextCollector> = match &options.context {
        Some(path) => static_collector(path)?,
        None => Arc::new(WorkspaceCollector::new(&options.root)),
    };
    let router = env.open_router(collector)?;

    let mut request = RouteRequest::new(options.text);
    request.urgency = options.urgency;
    let response = router.route(&request).await?;

    finish(&response, options.save_state.as_deref())
}

pub async fn resume(env: &Environment, state: &Path, answer: &str) -> Result<()> {
    let raw = std::fs::read_to_string(state)
        .with_context(|| format!("read suspended session {}", state.display()))?;
    let suspended: SuspendedSession = serde_json::from_str(&raw)
        .with_context(|| format!("invalid suspended session {}", state.display()))?;

    // The saved snapshot is reused, so no collector is ever queried here.
    let router = env.open_router(Arc::new(StaticCollector::new()))?;
    let response = router.resume(suspended, answer).await?;

    // A second clarification overwrites the state file; a resolution retires it.
    let next_state = response.suspended().is_some().then_some(state);
    finish(&response, next_state)?;
    if response.decision().is_some() {
        if let Err(err) = std::fs::remove_file(state) {
            log::warn!("could not remove {}: {err}", state.display());
        }
    }
    Ok(())
}

fn finish(response: &RouteResponse, save_state: Option<&Path>) -> Result<()> {
    if let Some(suspended) = response.suspended() {
        log::info!("{}", suspended.clarification.prompt);
        if let Some(path) = save_state {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let raw = serde_json::to_string_pretty(suspended)?;
            std::fs::write(path, raw)
                .with_context(|| format!("write suspended session {}", path.display()))?;
        }
    }
    print_json(response)
}
