// src/remote/client.rs

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::common::error::{classify_status, ApiError};
use crate::remote::{ApiRequest, ApiResponse, Method, Transport};
use crate::stores::auth::SessionState;

// O análogo da instância compartilhada de HTTP do cliente original:
// injeta o bearer token em toda requisição, impõe o tempo limite
// configurado e trata 401 globalmente derrubando a sessão.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionState>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionState>, timeout: Duration) -> Self {
        Self {
            transport,
            session,
            timeout,
        }
    }

    async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        // Interceptor de requisição: anexa o token quando há sessão.
        request.bearer = self.session.token();

        let method = request.method;
        let path = request.path.clone();

        let outcome = tokio::time::timeout(self.timeout, self.transport.execute(request)).await;
        let result = match outcome {
            Ok(Ok(response)) if (200..300).contains(&response.status) => Ok(response),
            Ok(Ok(response)) => Err(classify_status(response.status, &response.body)),
            Ok(Err(error)) => Err(error),
            // Estourou o tempo limite: nenhuma mutação de cache acontece.
            Err(_) => Err(ApiError::Timeout),
        };

        // Interceptor de resposta: 401 sempre encerra a sessão local,
        // não importa qual operação o produziu.
        if let Err(error) = &result {
            if matches!(error, ApiError::AuthenticationRejected) {
                tracing::warn!("🔒 Sessão rejeitada pelo servidor em {} {}", method.as_str(), path);
                self.session.clear();
            } else {
                tracing::error!("Falha em {} {}: {}", method.as_str(), path, error);
            }
        }

        result
    }

    fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
        serde_json::from_value(response.body)
            .map_err(|error| anyhow::anyhow!("resposta fora do contrato da API: {}", error).into())
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|error| anyhow::anyhow!("falha ao serializar o corpo: {}", error).into())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with(path, Vec::new()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(ApiRequest::new(Method::Get, path).with_query(query))
            .await?;
        Self::decode(response)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(ApiRequest::new(Method::Post, path).with_body(Self::encode(body)?))
            .await?;
        Self::decode(response)
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(ApiRequest::new(Method::Patch, path).with_body(Self::encode(body)?))
            .await?;
        Self::decode(response)
    }

    /// PATCH sem corpo (ex.: iniciar uma tarefa).
    pub async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(ApiRequest::new(Method::Patch, path)).await?;
        Self::decode(response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::new(Method::Delete, path)).await?;
        Ok(())
    }
}
