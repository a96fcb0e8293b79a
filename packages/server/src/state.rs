use std::sync::Arc;

use common::storage::BlobStore;

use crate::config::AppConfig;
use crate::repo::ProblemStore;
use crate::runs::RunService;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
    pub problems: Arc<dyn ProblemStore>,
    pub sessions: Arc<SessionManager>,
    pub runs: Arc<RunService>,
}
