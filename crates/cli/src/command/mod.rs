use anyhow::{Context, Result};
use router_context::{ContextCollector, StaticCollector};
use router_engine::{Router, RouterConfig};
use router_feedback::FeedbackStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod feedback;
mod route;
mod rules;

pub use feedback::{feedback, weights};
pub use route::{resume, route, RouteOptions};
pub use rules::rules;

/// Global flags every subcommand shares.
pub struct Environment {
    pub config: Option<PathBuf>,
    pub store: PathBuf,
}

impl Environment {
    pub fn load_config(&self) -> Result<RouterConfig> {
        RouterConfig::load(self.config.as_deref())
    }

    pub fn open_store(&self, config: &RouterConfig) -> Result<Arc<FeedbackStore>> {
        let store = FeedbackStore::open(&self.store, config.feedback)
            .with_context(|| format!("open feedback store {}", self.store.display()))?;
        Ok(Arc::new(store))
    }

    /// Router over the configured rules and the shared store. Decisions whose correction window
    /// has passed are settled first so they count before this session scores anything.
    pub fn open_router(&self, collector: Arc<dyn ContextCollector>) -> Result<Router> {
        let config = self.load_config()?;
        let store = self.open_store(&config)?;
        let router = Router::new(config, collector, store)?;
        let settled = router.settle_feedback()?;
        if settled > 0 {
            log::debug!("settled {settled} expired decisions");
        }
        Ok(router)
    }
}

fn static_collector(path: &Path) -> Result<Arc<dyn ContextCollector>> {
    let collector = StaticCollector::from_json_file(path)
        .with_context(|| format!("load context snapshot {}", path.display()))?;
    Ok(Arc::new(collector))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", router_protocol::serialize_json_pretty(value)?);
    Ok(())
}
