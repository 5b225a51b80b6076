// src/router/mod.rs

use thiserror::Error;

use crate::models::auth::Role;

pub mod guard;
pub use guard::{decide, role_home, Guard, Verdict};

// Exigências declaráveis em cada segmento de rota. Estáticas: a tabela é
// montada uma vez na inicialização e nunca muda.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub allowed_roles: Option<Vec<Role>>,
}

#[derive(Debug, Clone)]
pub struct Route {
    // Padrão relativo ao pai: "admin", "companies/:id", "*" (pega-tudo).
    pub path: &'static str,
    pub name: Option<&'static str>,
    pub redirect: Option<&'static str>,
    pub meta: RouteMeta,
    pub children: Vec<Route>,
}

impl Route {
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            name: None,
            redirect: None,
            meta: RouteMeta::default(),
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn redirect_to(mut self, target: &'static str) -> Self {
        self.redirect = Some(target);
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.meta.requires_auth = true;
        self
    }

    pub fn requires_guest(mut self) -> Self {
        self.meta.requires_guest = true;
        self
    }

    pub fn roles(mut self, roles: Vec<Role>) -> Self {
        self.meta.allowed_roles = Some(roles);
        self
    }

    pub fn with_children(mut self, children: Vec<Route>) -> Self {
        self.children = children;
        self
    }
}

/// O resumo da cadeia casada (raiz → folha) que a decisão de navegação
/// consome: `requires_auth`/`requires_guest` valem se qualquer segmento os
/// declara; `allowed_roles` vem do segmento MAIS PROFUNDO que declara:
/// um filho mais restrito vence o conjunto mais largo do ancestral.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirements {
    pub name: Option<&'static str>,
    pub redirect: Option<&'static str>,
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub allowed_roles: Option<Vec<Role>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteTableError {
    // Configuração inválida: rejeitada na montagem da tabela, nunca
    // adivinhada por navegação.
    #[error("a rota '{path}' exige autenticação e visitante ao mesmo tempo")]
    ConflictingRequirements { path: String },
}

#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Result<Self, RouteTableError> {
        validate(&routes, false, false, "")?;
        Ok(Self { routes })
    }

    /// Casa um caminho contra a árvore e devolve o resumo da cadeia.
    /// `None` = rota desconhecida, sem exigências.
    pub fn match_path(&self, path: &str) -> Option<Requirements> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut chain = Vec::new();
        if !find(&self.routes, &segments, &mut chain) {
            return None;
        }

        let leaf = chain.last().expect("cadeia casada nunca é vazia");
        Some(Requirements {
            name: leaf.name,
            redirect: leaf.redirect,
            requires_auth: chain.iter().any(|route| route.meta.requires_auth),
            requires_guest: chain.iter().any(|route| route.meta.requires_guest),
            allowed_roles: chain
                .iter()
                .rev()
                .find_map(|route| route.meta.allowed_roles.clone()),
        })
    }
}

fn validate(
    routes: &[Route],
    inherited_auth: bool,
    inherited_guest: bool,
    prefix: &str,
) -> Result<(), RouteTableError> {
    for route in routes {
        let auth = inherited_auth || route.meta.requires_auth;
        let guest = inherited_guest || route.meta.requires_guest;
        let path = format!("{}/{}", prefix, route.path);
        if auth && guest {
            return Err(RouteTableError::ConflictingRequirements { path });
        }
        validate(&route.children, auth, guest, &path)?;
    }
    Ok(())
}

fn find<'a>(routes: &'a [Route], segments: &[&str], chain: &mut Vec<&'a Route>) -> bool {
    for route in routes {
        if route.path == "*" {
            chain.push(route);
            return true;
        }

        let pattern: Vec<&str> = route.path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(consumed) = consume(&pattern, segments) {
            let rest = &segments[consumed..];
            chain.push(route);
            if rest.is_empty() {
                return true;
            }
            if find(&route.children, rest, chain) {
                return true;
            }
            chain.pop();
        }
    }
    false
}

// Quantos segmentos do caminho o padrão cobre; `:param` casa qualquer
// segmento único.
fn consume(pattern: &[&str], segments: &[&str]) -> Option<usize> {
    if segments.len() < pattern.len() {
        return None;
    }
    for (expected, actual) in pattern.iter().zip(segments) {
        if expected.starts_with(':') {
            continue;
        }
        if expected != actual {
            return None;
        }
    }
    Some(pattern.len())
}

/// A tabela de rotas do cliente.
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new("").redirect_to("/login"),
        Route::new("login").named("Login").requires_guest(),
        Route::new("register").named("Register").requires_guest(),
        // Área administrativa
        Route::new("admin")
            .requires_auth()
            .roles(vec![Role::SuperAdmin, Role::Admin])
            .with_children(vec![
                // Empresas são exclusivas do super admin: o conjunto mais
                // restrito do filho vence o do pai.
                Route::new("companies")
                    .named("AdminCompanies")
                    .roles(vec![Role::SuperAdmin]),
                Route::new("companies/:id")
                    .named("AdminCompanyDetail")
                    .roles(vec![Role::SuperAdmin]),
                Route::new("dashboard").named("AdminDashboard"),
                Route::new("users").named("AdminUsers"),
                Route::new("buildings").named("AdminBuildings"),
                Route::new("buildings/:id").named("AdminBuildingDetail"),
                Route::new("rooms").named("AdminRooms"),
                Route::new("tasks").named("AdminTasks"),
            ]),
        // Área de limpeza
        Route::new("cleaner")
            .requires_auth()
            .roles(vec![Role::Cleaner])
            .with_children(vec![
                Route::new("tasks").named("CleanerTasks"),
                Route::new("tasks/:id").named("CleanerTaskDetail"),
                Route::new("profile").named("CleanerProfile"),
            ]),
        // Rota 404
        Route::new("*").named("NotFound"),
    ]
}
