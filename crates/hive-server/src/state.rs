use hive_core::backend::open_backend;
use hive_core::config::Config;
use hive_core::manager::StateManager;
use hive_core::paths;
use hive_inbox::auth::TokenService;
use hive_inbox::routing::Router;
use hive_inbox::store::MessageStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Shared application state passed to all route handlers.
///
/// Holds the single in-process `StateManager` (this server is the intended
/// single writer for the backing file) plus the parallel inbox store.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub manager: Arc<StateManager>,
    pub store: Arc<MessageStore>,
    pub router: Arc<Router>,
    pub tokens: Arc<TokenService>,
    pub event_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        let backend = open_backend(&root, &config)?;
        let manager = Arc::new(StateManager::open(backend)?);
        let store = Arc::new(MessageStore::open(&paths::inbox_db_path(&root))?);
        let router = Arc::new(Router::from_file(&paths::routing_path(&root))?);
        let tokens = Arc::new(TokenService::new(&config.auth_secret, config.token_ttl())?);

        let (event_tx, _) = broadcast::channel(64);

        // Bridge core observer events into the SSE broadcast channel.
        // Lagging or absent subscribers are fine; send errors just mean
        // nobody is listening right now.
        let tx = event_tx.clone();
        manager.add_observer(move |event| match serde_json::to_string(event) {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => warn!(error = %e, "failed to serialize state event"),
        });

        Ok(Self {
            root,
            config: Arc::new(config),
            manager,
            store,
            router,
            tokens,
            event_tx,
        })
    }
}
