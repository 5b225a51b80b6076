use serde_json::Value;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Cada variante corresponde a uma classe de falha que a camada de
// apresentação precisa distinguir.
#[derive(Debug, Error)]
pub enum ApiError {
    // 401, a única variante com efeito colateral obrigatório: o ApiClient
    // derruba a sessão antes de propagá-la.
    #[error("Sessão expirada ou token inválido")]
    AuthenticationRejected,

    // 403: apenas exibida, nenhum estado muda.
    #[error("Sem permissão para realizar esta ação")]
    AuthorizationDenied,

    #[error("Recurso não encontrado")]
    NotFound,

    // 422: carrega as mensagens de campo retornadas pelo servidor
    // (ou produzidas localmente pelo `validator` antes da requisição).
    #[error("Um ou mais campos são inválidos")]
    ValidationFailed(Vec<String>),

    #[error("Erro interno do servidor ({status})")]
    ServerFault { status: u16 },

    #[error("Resposta inesperada do servidor ({status})")]
    UnexpectedStatus { status: u16 },

    #[error("Tempo de espera da requisição esgotado")]
    Timeout,

    #[error("Não foi possível conectar ao servidor")]
    NetworkUnreachable,

    // Rejeição local da máquina de estados: nunca chega ao servidor
    // e nunca altera o cache.
    #[error("Operação '{action}' rejeitada: {detail}")]
    PreconditionViolation {
        action: &'static str,
        detail: String,
    },

    // Já existe uma mutação em voo para a mesma tarefa.
    #[error("Outra operação para esta tarefa ainda está em andamento")]
    ConflictInFlight,

    // Variante genérica para falhas locais (armazenamento, serialização).
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do cliente")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Uma falha originada no servidor (ou na rede). Falhas locais como
    /// `PreconditionViolation` nunca geram requisição.
    pub fn is_remote(&self) -> bool {
        !matches!(
            self,
            ApiError::ValidationFailed(_)
                | ApiError::PreconditionViolation { .. }
                | ApiError::ConflictInFlight
                | ApiError::Internal(_)
        )
    }
}

// Converte os erros do `validator` na mesma forma achatada que o servidor
// usa no 422: uma lista de mensagens por campo.
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                match &error.message {
                    Some(message) => messages.push(message.to_string()),
                    None => messages.push(format!("Campo inválido: {}", field)),
                }
            }
        }
        ApiError::ValidationFailed(messages)
    }
}

/// Classifica uma resposta não-2xx do servidor.
///
/// Espelha o tratamento global de erros do cliente: 401 derruba a sessão,
/// 422 extrai `message` (string ou lista), 5xx vira falha de servidor.
pub fn classify_status(status: u16, body: &Value) -> ApiError {
    match status {
        401 => ApiError::AuthenticationRejected,
        403 => ApiError::AuthorizationDenied,
        404 => ApiError::NotFound,
        422 => ApiError::ValidationFailed(extract_messages(body)),
        500..=599 => ApiError::ServerFault { status },
        _ => ApiError::UnexpectedStatus { status },
    }
}

// O servidor responde 422 com `message` sendo uma string única ou uma
// lista de mensagens de campo.
fn extract_messages(body: &Value) -> Vec<String> {
    match body.get("message") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        Some(Value::String(message)) => vec![message.clone()],
        _ => vec!["Erro de validação.".to_owned()],
    }
}
