// src/router/guard.rs

use std::sync::Arc;

use crate::models::auth::Role;
use crate::router::{Requirements, RouteTable};
use crate::stores::auth::{SessionSnapshot, SessionState};

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_HOME: &str = "/admin/dashboard";
pub const CLEANER_HOME: &str = "/cleaner/tasks";

/// O resultado de uma decisão de navegação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    RedirectTo(String),
}

/// A tela inicial de cada papel.
pub fn role_home(role: Role) -> &'static str {
    match role {
        Role::Cleaner => CLEANER_HOME,
        Role::Admin | Role::SuperAdmin => ADMIN_HOME,
    }
}

/// A decisão de autorização, pura: mesmas exigências + mesma fotografia da
/// sessão ⇒ mesmo veredito, sempre. As regras valem nesta ordem fixa e a
/// primeira que casa decide.
pub fn decide(requirements: Option<&Requirements>, session: &SessionSnapshot) -> Verdict {
    // Rota desconhecida: sem exigências, segue.
    let Some(requirements) = requirements else {
        return Verdict::Proceed;
    };

    if requirements.requires_auth {
        // 1. Sem sessão, só o login interessa.
        if !session.authenticated {
            return Verdict::RedirectTo(LOGIN_PATH.to_owned());
        }
        // 2. Papel fora do conjunto permitido: cada um volta para a sua casa.
        if let (Some(allowed), Some(role)) = (&requirements.allowed_roles, session.role) {
            if !allowed.contains(&role) {
                return Verdict::RedirectTo(role_home(role).to_owned());
            }
        }
    }

    // 3. Rota de visitante com sessão ativa: idem.
    if requirements.requires_guest && session.authenticated {
        if let Some(role) = session.role {
            return Verdict::RedirectTo(role_home(role).to_owned());
        }
    }

    // 4. Nada a objetar.
    Verdict::Proceed
}

// O guardião de navegação: consultado a cada tentativa de navegação.
#[derive(Clone)]
pub struct Guard {
    routes: Arc<RouteTable>,
    session: Arc<SessionState>,
}

impl Guard {
    pub fn new(routes: Arc<RouteTable>, session: Arc<SessionState>) -> Self {
        Self { routes, session }
    }

    /// Decide uma navegação. O único passo com efeito acontece antes da
    /// decisão: se não há sessão em memória, tenta reidratar a persistida;
    /// assim o veredito enxerga a sessão que o usuário já tinha.
    pub fn before_each(&self, path: &str) -> Verdict {
        if !self.session.is_authenticated() {
            self.session.restore_from_storage();
        }

        let requirements = self.routes.match_path(path);

        // Rotas de redirecionamento puro (ex.: "/" → "/login") resolvem
        // antes de qualquer regra de autorização.
        if let Some(target) = requirements.as_ref().and_then(|req| req.redirect) {
            return Verdict::RedirectTo(target.to_owned());
        }

        let verdict = decide(requirements.as_ref(), &self.session.snapshot());
        if let Verdict::RedirectTo(target) = &verdict {
            tracing::debug!("Navegação para {} redirecionada para {}", path, target);
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::default_routes;
    use crate::storage::{InMemoryStorage, SessionStorage, TOKEN_KEY, USER_KEY};
    use crate::stores::auth::testing::user_with_role;

    fn table() -> Arc<RouteTable> {
        Arc::new(RouteTable::new(default_routes()).unwrap())
    }

    fn guest() -> SessionSnapshot {
        SessionSnapshot {
            authenticated: false,
            role: None,
        }
    }

    fn logged_in(role: Role) -> SessionSnapshot {
        SessionSnapshot {
            authenticated: true,
            role: Some(role),
        }
    }

    #[test]
    fn an_unauthenticated_session_is_sent_to_login() {
        let table = table();
        let requirements = table.match_path("/admin/tasks");
        let verdict = decide(requirements.as_ref(), &guest());
        assert_eq!(verdict, Verdict::RedirectTo(LOGIN_PATH.to_owned()));
    }

    #[test]
    fn a_cleaner_on_an_admin_route_goes_back_to_cleaner_home() {
        let table = table();
        let requirements = table.match_path("/admin/dashboard");
        let verdict = decide(requirements.as_ref(), &logged_in(Role::Cleaner));
        assert_eq!(verdict, Verdict::RedirectTo(CLEANER_HOME.to_owned()));
    }

    #[test]
    fn an_admin_on_a_super_admin_route_goes_to_admin_home() {
        let table = table();
        // companies restringe ao super admin no segmento filho.
        let requirements = table.match_path("/admin/companies");
        let verdict = decide(requirements.as_ref(), &logged_in(Role::Admin));
        assert_eq!(verdict, Verdict::RedirectTo(ADMIN_HOME.to_owned()));

        let verdict = decide(requirements.as_ref(), &logged_in(Role::SuperAdmin));
        assert_eq!(verdict, Verdict::Proceed);
    }

    #[test]
    fn an_authenticated_user_on_a_guest_route_goes_home() {
        let table = table();
        let requirements = table.match_path("/login");
        let verdict = decide(requirements.as_ref(), &logged_in(Role::Cleaner));
        assert_eq!(verdict, Verdict::RedirectTo(CLEANER_HOME.to_owned()));

        let verdict = decide(requirements.as_ref(), &logged_in(Role::SuperAdmin));
        assert_eq!(verdict, Verdict::RedirectTo(ADMIN_HOME.to_owned()));
    }

    #[test]
    fn guests_may_visit_guest_routes_and_unknown_routes() {
        let table = table();
        let login = table.match_path("/login");
        assert_eq!(decide(login.as_ref(), &guest()), Verdict::Proceed);

        // Sem exigências declaradas (pega-tudo), segue mesmo sem sessão.
        let unknown = table.match_path("/qualquer/coisa");
        assert_eq!(decide(unknown.as_ref(), &guest()), Verdict::Proceed);

        // E sem tabela nenhuma (rota realmente desconhecida), idem.
        assert_eq!(decide(None, &guest()), Verdict::Proceed);
    }

    #[test]
    fn the_decision_is_pure() {
        let table = table();
        let requirements = table.match_path("/admin/companies");
        let session = logged_in(Role::Cleaner);
        let first = decide(requirements.as_ref(), &session);
        for _ in 0..3 {
            assert_eq!(decide(requirements.as_ref(), &session), first);
        }
    }

    #[test]
    fn before_each_rehydrates_the_persisted_session() {
        let storage = Arc::new(InMemoryStorage::new());
        let cleaner = user_with_role(Role::Cleaner);
        storage.set(TOKEN_KEY, "tok-1").unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&cleaner).unwrap())
            .unwrap();

        let session = Arc::new(SessionState::new(storage));
        let guard = Guard::new(table(), session.clone());

        // A decisão já enxerga a sessão persistida: a rota do limpador passa.
        assert_eq!(guard.before_each("/cleaner/tasks"), Verdict::Proceed);
        assert!(session.is_authenticated());

        // E a rota de visitante manda de volta para a casa do papel.
        assert_eq!(
            guard.before_each("/login"),
            Verdict::RedirectTo(CLEANER_HOME.to_owned())
        );
    }

    #[test]
    fn before_each_resolves_pure_redirect_routes() {
        let session = Arc::new(SessionState::new(Arc::new(InMemoryStorage::new())));
        let guard = Guard::new(table(), session);
        assert_eq!(
            guard.before_each("/"),
            Verdict::RedirectTo(LOGIN_PATH.to_owned())
        );
    }
}
