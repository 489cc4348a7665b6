//! Product validation: every order line must reference a known product.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaKey;
use domain::Event;
use event_store::{CompensationRecord, CompensationStore, EventStoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};
use crate::handler::Participant;
use crate::stage::Stage;

/// Outcome of validating one saga's products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub key: SagaKey,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Validation {
    pub fn new(key: SagaKey, success: bool) -> Self {
        let now = Utc::now();
        Self {
            key,
            success,
            created_at: now,
            updated_at: now,
        }
    }
}

impl CompensationRecord for Validation {
    const KIND: &'static str = "product_validation";

    fn key(&self) -> &SagaKey {
        &self.key
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Catalogue of sellable products.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns true if a product with the code exists.
    async fn exists_by_code(&self, code: &str) -> std::result::Result<bool, EventStoreError>;
}

/// In-memory product catalogue.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    codes: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalogue holding the given product codes.
    pub fn with_products<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Arc::new(RwLock::new(codes.into_iter().map(Into::into).collect())),
        }
    }

    /// Adds a product code.
    pub async fn add_product(&self, code: impl Into<String>) {
        self.codes.write().await.insert(code.into());
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn exists_by_code(&self, code: &str) -> std::result::Result<bool, EventStoreError> {
        Ok(self.codes.read().await.contains(code))
    }
}

/// The product validation participant.
pub struct ProductValidationService {
    catalog: Arc<dyn ProductCatalog>,
    validations: Arc<dyn CompensationStore<Validation>>,
}

impl ProductValidationService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        validations: Arc<dyn CompensationStore<Validation>>,
    ) -> Self {
        Self {
            catalog,
            validations,
        }
    }
}

#[async_trait]
impl Participant for ProductValidationService {
    const STAGE: Stage = Stage::ProductValidation;
    const SUCCESS_MESSAGE: &'static str = "Products are validated successfully!";
    const FAILURE_MESSAGE: &'static str = "Fail to validate products";
    const ROLLBACK_MESSAGE: &'static str = "Rollback executed on product validation!";
    const ROLLBACK_FAILURE_MESSAGE: &'static str = "Rollback not executed on product validation";

    async fn has_processed(&self, key: &SagaKey) -> Result<bool> {
        Ok(self.validations.exists_by_order_and_transaction(key).await?)
    }

    async fn check(&self, event: &Event) -> Result<()> {
        let order = &event.payload;
        if order.products.is_empty() {
            return Err(SagaError::precondition("Product list is empty!"));
        }
        if order.id.as_uuid().is_nil() || order.transaction_id.is_empty() {
            return Err(SagaError::precondition(
                "OrderID and TransactionID must be informed!",
            ));
        }

        for line in &order.products {
            let code = line.product.code.trim();
            if code.is_empty() {
                return Err(SagaError::precondition("Product must be informed!"));
            }
            if !self.catalog.exists_by_code(code).await? {
                return Err(SagaError::precondition(format!(
                    "Product with code {code} does not exist!"
                )));
            }
        }

        Ok(())
    }

    async fn apply(&self, event: &mut Event) -> Result<()> {
        self.validations
            .create(&Validation::new(event.key(), true))
            .await?;
        Ok(())
    }

    async fn compensate(&self, event: &mut Event) -> Result<()> {
        let key = event.key();
        let validation = match self.validations.find_by_order_and_transaction(&key).await? {
            Some(mut validation) => {
                validation.success = false;
                validation.updated_at = Utc::now();
                validation
            }
            None => Validation::new(key, false),
        };

        self.validations.save(&validation).await?;
        Ok(())
    }
}
