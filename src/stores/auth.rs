// src/stores/auth.rs

use std::sync::{Arc, Mutex};

use validator::Validate;

use crate::common::error::ApiError;
use crate::models::auth::{AuthResponse, LoginPayload, RegisterPayload, Role, User};
use crate::remote::ApiClient;
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};

#[derive(Debug, Clone)]
struct SessionPair {
    token: String,
    user: User,
}

// O par token/principal do processo, atrás de um único Mutex: os dois são
// instalados e removidos juntos, nunca existe um sem o outro depois de uma
// operação completa. Compartilhado (Arc) entre o ApiClient, o AuthStore e
// o guard de navegação.
pub struct SessionState {
    pair: Mutex<Option<SessionPair>>,
    storage: Arc<dyn SessionStorage>,
}

/// Fotografia imutável da sessão para a decisão pura do guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub role: Option<Role>,
}

impl SessionState {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            pair: Mutex::new(None),
            storage,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.pair
            .lock()
            .unwrap()
            .as_ref()
            .map(|pair| pair.token.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.pair
            .lock()
            .unwrap()
            .as_ref()
            .map(|pair| pair.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.pair.lock().unwrap().is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let pair = self.pair.lock().unwrap();
        SessionSnapshot {
            authenticated: pair.is_some(),
            role: pair.as_ref().map(|pair| pair.user.role),
        }
    }

    /// Instala token + principal na memória e no armazenamento durável.
    /// Se a persistência falhar no meio, a chave já gravada é removida e a
    /// sessão anterior permanece intacta.
    pub fn install(&self, token: String, user: &User) -> Result<(), ApiError> {
        let serialized = serde_json::to_string(user)
            .map_err(|error| anyhow::anyhow!("falha ao serializar o principal: {}", error))?;

        let mut pair = self.pair.lock().unwrap();
        self.storage.set(TOKEN_KEY, &token)?;
        if let Err(error) = self.storage.set(USER_KEY, &serialized) {
            self.storage.remove(TOKEN_KEY);
            return Err(error.into());
        }
        *pair = Some(SessionPair {
            token,
            user: user.clone(),
        });
        Ok(())
    }

    /// Regrava só o principal (o token atual continua valendo).
    pub fn update_user(&self, user: &User) -> Result<(), ApiError> {
        let serialized = serde_json::to_string(user)
            .map_err(|error| anyhow::anyhow!("falha ao serializar o principal: {}", error))?;

        let mut pair = self.pair.lock().unwrap();
        if let Some(existing) = pair.as_mut() {
            self.storage.set(USER_KEY, &serialized)?;
            existing.user = user.clone();
        }
        Ok(())
    }

    /// Limpa memória e armazenamento. Sempre bem-sucedida e idempotente.
    pub fn clear(&self) {
        let mut pair = self.pair.lock().unwrap();
        *pair = None;
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);
    }

    /// Reinstala a sessão persistida, se houver uma íntegra. Um par
    /// incompleto ou um principal malformado derruba o que restou: nunca
    /// fica meia sessão.
    pub fn restore_from_storage(&self) -> bool {
        let mut pair = self.pair.lock().unwrap();
        match (self.storage.get(TOKEN_KEY), self.storage.get(USER_KEY)) {
            (Some(token), Some(raw_user)) => match serde_json::from_str::<User>(&raw_user) {
                Ok(user) => {
                    *pair = Some(SessionPair { token, user });
                    true
                }
                Err(error) => {
                    tracing::warn!("Principal persistido malformado, descartando a sessão: {}", error);
                    *pair = None;
                    self.storage.remove(TOKEN_KEY);
                    self.storage.remove(USER_KEY);
                    false
                }
            },
            (None, None) => false,
            _ => {
                tracing::warn!("Sessão persistida incompleta, descartando.");
                *pair = None;
                self.storage.remove(TOKEN_KEY);
                self.storage.remove(USER_KEY);
                false
            }
        }
    }
}

// O store de autenticação: as operações de sessão que as telas chamam.
#[derive(Clone)]
pub struct AuthStore {
    api: ApiClient,
    session: Arc<SessionState>,
}

impl AuthStore {
    pub fn new(api: ApiClient, session: Arc<SessionState>) -> Self {
        Self { api, session }
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<User, ApiError> {
        payload.validate()?;

        let response: AuthResponse = self.api.post("/auth/login", payload).await?;
        self.session
            .install(response.access_token.clone(), &response.user)?;

        tracing::info!(
            "👤 Login de {} ({})",
            response.user.name,
            response.user.role.display_name()
        );
        Ok(response.user)
    }

    /// Registra um novo usuário. Não instala sessão: o fluxo original manda
    /// o usuário para o login em seguida.
    pub async fn register(&self, payload: &RegisterPayload) -> Result<User, ApiError> {
        payload.validate()?;
        self.api.post("/auth/register", payload).await
    }

    pub fn logout(&self) {
        self.session.clear();
        tracing::info!("Sessão encerrada.");
    }

    pub fn restore_from_storage(&self) -> bool {
        self.session.restore_from_storage()
    }

    /// Revalida o principal contra o servidor. Qualquer falha é tratada
    /// como sessão revogada: a sessão local é derrubada antes de propagar.
    pub async fn refresh_principal(&self) -> Result<User, ApiError> {
        match self.api.get::<User>("/auth/profile").await {
            Ok(user) => {
                self.session.update_user(&user)?;
                Ok(user)
            }
            Err(error) => {
                self.session.clear();
                Err(error)
            }
        }
    }

    // --- Predicados derivados (puros) ---

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.current_user().is_some_and(|user| user.role.is_admin())
    }

    pub fn is_super_admin(&self) -> bool {
        self.current_user()
            .is_some_and(|user| user.role == Role::SuperAdmin)
    }

    pub fn is_cleaner(&self) -> bool {
        self.current_user()
            .is_some_and(|user| user.role == Role::Cleaner)
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn token(&self) -> Option<String> {
        self.session.token()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{sample_user, user_with_role};
    use super::*;
    use crate::remote::testing::ScriptedTransport;
    use crate::remote::Method;
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use std::time::Duration;

    fn store_with(
        transport: Arc<ScriptedTransport>,
        storage: Arc<dyn SessionStorage>,
    ) -> (AuthStore, Arc<SessionState>) {
        let session = Arc::new(SessionState::new(storage));
        let api = ApiClient::new(transport, session.clone(), Duration::from_secs(10));
        (AuthStore::new(api, session.clone()), session)
    }

    fn login_payload() -> LoginPayload {
        LoginPayload {
            email: "ana@example.com".into(),
            password: "secreta".into(),
        }
    }

    #[tokio::test]
    async fn login_installs_token_and_principal_atomically() {
        let transport = Arc::new(ScriptedTransport::new());
        let user = sample_user();
        transport.stub(
            Method::Post,
            "/auth/login",
            200,
            json!({ "access_token": "tok-1", "user": user }),
        );
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemoryStorage::new());
        let (store, session) = store_with(transport, storage.clone());

        let logged = store.login(&login_payload()).await.unwrap();
        assert_eq!(logged.id, user.id);
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("tok-1"));
        // Persistiu as duas chaves juntas.
        assert!(storage.get(TOKEN_KEY).is_some());
        assert!(storage.get(USER_KEY).is_some());
    }

    #[tokio::test]
    async fn failed_login_leaves_previous_session_untouched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.stub(
            Method::Post,
            "/auth/login",
            422,
            json!({ "message": "credenciais inválidas" }),
        );
        let (store, session) = store_with(transport, Arc::new(InMemoryStorage::new()));

        let previous = sample_user();
        session.install("tok-antigo".into(), &previous).unwrap();

        let result = store.login(&login_payload()).await;
        assert!(matches!(result, Err(ApiError::ValidationFailed(_))));
        assert_eq!(session.token().as_deref(), Some("tok-antigo"));
        assert_eq!(session.current_user().unwrap().id, previous.id);
    }

    #[tokio::test]
    async fn invalid_credentials_never_reach_the_remote() {
        let transport = Arc::new(ScriptedTransport::new());
        let (store, _) = store_with(transport.clone(), Arc::new(InMemoryStorage::new()));

        let result = store
            .login(&LoginPayload {
                email: "sem-arroba".into(),
                password: "123".into(),
            })
            .await;
        assert!(matches!(result, Err(ApiError::ValidationFailed(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemoryStorage::new());
        let (store, session) = store_with(transport, storage.clone());

        session.install("tok-1".into(), &sample_user()).unwrap();
        store.logout();
        assert!(!store.is_authenticated());
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(USER_KEY).is_none());

        // Segunda chamada: mesmo estado terminal, nenhum pânico.
        store.logout();
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn restore_round_trips_after_a_simulated_restart() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        let (_, session) = store_with(transport.clone(), storage.clone());

        let user = user_with_role(Role::Cleaner);
        session.install("tok-persistido".into(), &user).unwrap();

        // "Reinício": um SessionState novo sobre o mesmo armazenamento.
        let (restarted, fresh_session) = store_with(transport, storage);
        assert!(!restarted.is_authenticated());
        assert!(restarted.restore_from_storage());
        assert!(restarted.is_authenticated());
        assert_eq!(fresh_session.token().as_deref(), Some("tok-persistido"));
        let restored = restarted.current_user().unwrap();
        assert_eq!(restored, user);
    }

    #[tokio::test]
    async fn malformed_stored_principal_forces_a_clean_logout() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemoryStorage::new());
        storage.set(TOKEN_KEY, "tok-1").unwrap();
        storage.set(USER_KEY, "{isto não é json").unwrap();

        let (store, session) = store_with(Arc::new(ScriptedTransport::new()), storage.clone());
        assert!(!store.restore_from_storage());
        assert!(!session.is_authenticated());
        // Nenhum resto ficou para trás.
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(USER_KEY).is_none());
    }

    #[tokio::test]
    async fn half_present_pair_is_treated_as_absent() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemoryStorage::new());
        storage.set(TOKEN_KEY, "tok-sozinho").unwrap();

        let (store, session) = store_with(Arc::new(ScriptedTransport::new()), storage.clone());
        assert!(!store.restore_from_storage());
        assert!(!session.is_authenticated());
        assert!(storage.get(TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn refresh_failure_is_fail_closed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.stub(Method::Get, "/auth/profile", 500, json!({}));
        let (store, session) = store_with(transport, Arc::new(InMemoryStorage::new()));

        session.install("tok-1".into(), &sample_user()).unwrap();
        let result = store.refresh_principal().await;
        assert!(matches!(result, Err(ApiError::ServerFault { status: 500 })));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_success_updates_the_principal_in_place() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut refreshed = sample_user();
        refreshed.name = "Ana Atualizada".into();
        transport.stub(Method::Get, "/auth/profile", 200, json!(refreshed));
        let (store, session) = store_with(transport, Arc::new(InMemoryStorage::new()));

        session.install("tok-1".into(), &sample_user()).unwrap();
        store.refresh_principal().await.unwrap();
        assert_eq!(session.current_user().unwrap().name, "Ana Atualizada");
        // O token não muda num refresh.
        assert_eq!(session.token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn role_predicates_follow_the_principal() {
        let (store, session) = store_with(
            Arc::new(ScriptedTransport::new()),
            Arc::new(InMemoryStorage::new()),
        );
        assert!(!store.is_admin());

        session
            .install("tok".into(), &user_with_role(Role::SuperAdmin))
            .unwrap();
        assert!(store.is_admin());
        assert!(store.is_super_admin());
        assert!(!store.is_cleaner());

        session
            .install("tok".into(), &user_with_role(Role::Cleaner))
            .unwrap();
        assert!(store.is_cleaner());
        assert!(!store.is_admin());
    }
}
