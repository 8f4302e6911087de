use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::PersistenceClient;

use crate::models::DepositPolicy;

pub struct PolicyService {
    persistence: Arc<PersistenceClient>,
}

impl PolicyService {
    pub fn new(persistence: Arc<PersistenceClient>) -> Self {
        Self { persistence }
    }

    /// Fetch the business's deposit/cancellation policy, falling back to the
    /// platform defaults when the business never configured one.
    pub async fn deposit_policy(
        &self,
        business_id: Uuid,
        auth_token: &str,
    ) -> Result<DepositPolicy> {
        let path = format!(
            "/rest/v1/business_policies?business_id=eq.{}",
            business_id
        );
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => {
                debug!("Business {} has no policy row, using defaults", business_id);
                Ok(DepositPolicy::default())
            }
        }
    }
}
