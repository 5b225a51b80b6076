// src/config.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::env;

use crate::remote::{ApiClient, Transport};
use crate::router::{default_routes, Guard, RouteTable};
use crate::storage::{FileStorage, InMemoryStorage, SessionStorage};
use crate::stores::auth::SessionState;
use crate::stores::{AuthStore, BuildingStore, CompanyStore, RoomStore, TaskStore, UserStore};

/// Inicializa o logger. Chamar uma única vez, no início do processo.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_target(false).compact().init();
}

#[derive(Debug, Clone)]
pub struct Config {
    // Base da API consumida pela implementação de Transport.
    pub api_base_url: String,
    // Toda requisição tem espera limitada; estourar vira ApiError::Timeout.
    pub request_timeout: Duration,
    // Sem caminho configurado, a sessão vive só na memória do processo.
    pub storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_owned(),
            request_timeout: Duration::from_secs(10),
            storage_path: None,
        }
    }
}

impl Config {
    // Carrega as configurações do ambiente, com os defaults do cliente.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let api_base_url = env::var("API_BASE_URL").unwrap_or(defaults.api_base_url);
        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let storage_path = env::var("SESSION_STORAGE_PATH").ok().map(PathBuf::from);

        Self {
            api_base_url,
            request_timeout,
            storage_path,
        }
    }
}

// O estado compartilhado do cliente: uma única instância por processo.
// `Clone` compartilha o MESMO estado por baixo (tudo é Arc): é assim que
// as telas e o roteador enxergam a mesma sessão e os mesmos caches.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionState>,
    pub routes: Arc<RouteTable>,
    pub guard: Guard,
    pub auth: AuthStore,
    pub tasks: TaskStore,
    pub buildings: BuildingStore,
    pub rooms: RoomStore,
    pub companies: CompanyStore,
    pub users: UserStore,
}

impl AppState {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        let storage: Arc<dyn SessionStorage> = match &config.storage_path {
            Some(path) => Arc::new(FileStorage::open(path.clone())?),
            None => Arc::new(InMemoryStorage::new()),
        };
        Self::with_storage(config, transport, storage)
    }

    /// Variante com o armazenamento já construído (testes e integrações).
    pub fn with_storage(
        config: Config,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SessionStorage>,
    ) -> anyhow::Result<Self> {
        // A tabela de rotas é validada aqui: configuração conflitante
        // impede a inicialização em vez de aparecer por navegação.
        let routes = Arc::new(RouteTable::new(default_routes())?);

        // --- Monta o gráfico de dependências ---
        let session = Arc::new(SessionState::new(storage));
        let api = ApiClient::new(transport, session.clone(), config.request_timeout);
        let guard = Guard::new(routes.clone(), session.clone());

        let state = Self {
            session: session.clone(),
            routes,
            guard,
            auth: AuthStore::new(api.clone(), session.clone()),
            tasks: TaskStore::new(api.clone()),
            buildings: BuildingStore::new(api.clone()),
            rooms: RoomStore::new(api.clone()),
            companies: CompanyStore::new(api.clone()),
            users: UserStore::new(api),
            config,
        };

        // Reidrata a sessão persistida na inicialização, como o cliente
        // original faz ao carregar o store de autenticação.
        state.session.restore_from_storage();

        tracing::info!("✅ Estado do cliente montado (API em {})", state.config.api_base_url);
        Ok(state)
    }
}
