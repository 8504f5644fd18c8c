//! Postal lookup clients.

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use tracing::debug;

use crate::domain::postal::{
    PostalLookupError,
    models::{PostalAddress, PostalCode},
};

/// Default ViaCEP-compatible endpoint.
pub const DEFAULT_POSTAL_LOOKUP_URL: &str = "https://viacep.com.br/ws";

#[automock]
#[async_trait]
pub trait PostalCodeLookup: Send + Sync {
    /// Resolve a postal code. A single attempt; callers own timeouts.
    async fn lookup(&self, postal_code: &PostalCode) -> Result<PostalAddress, PostalLookupError>;
}

/// Lookup against a ViaCEP-compatible JSON endpoint
/// (`GET {base_url}/{cep}/json/`).
#[derive(Debug, Clone)]
pub struct HttpPostalCodeLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPostalCodeLookup {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    logradouro: String,

    #[serde(default)]
    bairro: String,

    #[serde(default)]
    localidade: String,

    #[serde(default)]
    uf: String,

    #[serde(default)]
    erro: Option<serde_json::Value>,
}

#[async_trait]
impl PostalCodeLookup for HttpPostalCodeLookup {
    #[tracing::instrument(
        name = "postal.http.lookup",
        skip(self, postal_code),
        fields(postal_code = %postal_code),
        err
    )]
    async fn lookup(&self, postal_code: &PostalCode) -> Result<PostalAddress, PostalLookupError> {
        let url = format!("{}/{}/json/", self.base_url, postal_code);

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Err(PostalLookupError::InvalidPostalCode(postal_code.to_string()));
        }

        let body: ViaCepResponse = response.error_for_status()?.json().await?;

        if body.erro.is_some() || body.localidade.is_empty() {
            debug!(postal_code = %postal_code, "postal code unknown to lookup service");

            return Err(PostalLookupError::NotFound);
        }

        Ok(PostalAddress {
            postal_code: postal_code.clone(),
            street: body.logradouro,
            neighborhood: body.bairro,
            city: body.localidade,
            region: body.uf,
        })
    }
}
