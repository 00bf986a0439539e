//! Typed access to the banking resources.
//!
//! `BankClient` is a thin layer over [`Gateway`]: it builds the request
//! path, sends it through the gateway (and so inherits token refresh) and
//! deserializes the JSON reply into the models.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::gateway::{ApiRequest, Gateway};
use super::ApiError;
use crate::models::{
    Account, Business, CurrentBalance, NewAccount, NewBusiness, NewTransaction, RoundUpReclaim,
    RoundUpStatus, SpendingTrend, TopSpender, Transaction,
};

/// Clone is cheap - the gateway shares its session and transport.
#[derive(Clone)]
pub struct BankClient {
    gateway: Gateway,
}

impl BankClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let value = self.gateway.send(&request).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    fn body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Accounts =====

    pub async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        self.fetch(ApiRequest::get("/accounts/")).await
    }

    pub async fn account(&self, id: &str) -> Result<Account, ApiError> {
        self.fetch(ApiRequest::get(format!("/accounts/{}/", id))).await
    }

    pub async fn create_account(&self, account: &NewAccount) -> Result<Account, ApiError> {
        self.fetch(ApiRequest::post("/accounts/", Some(Self::body(account)?)))
            .await
    }

    pub async fn current_balance(&self, id: &str) -> Result<CurrentBalance, ApiError> {
        self.fetch(ApiRequest::get(format!("/accounts/{}/current_balance/", id)))
            .await
    }

    /// Flip the round-up feature on or off; the reply carries the new state.
    pub async fn toggle_round_up(&self, id: &str) -> Result<RoundUpStatus, ApiError> {
        self.fetch(ApiRequest::post(format!("/accounts/{}/enable_roundup/", id), None))
            .await
    }

    pub async fn reclaim_round_up(&self, id: &str) -> Result<RoundUpReclaim, ApiError> {
        self.fetch(ApiRequest::post(format!("/accounts/{}/reclaim_roundup/", id), None))
            .await
    }

    pub async fn spending_trends(&self, id: &str) -> Result<Vec<SpendingTrend>, ApiError> {
        self.fetch(ApiRequest::get(format!("/accounts/{}/spending_trends/", id)))
            .await
    }

    // ===== Transactions =====

    pub async fn transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        self.fetch(ApiRequest::get("/transactions/")).await
    }

    pub async fn account_transactions(&self, account_id: &str) -> Result<Vec<Transaction>, ApiError> {
        self.fetch(ApiRequest::get(format!("/transactions/account/{}/", account_id)))
            .await
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<Transaction, ApiError> {
        self.fetch(ApiRequest::post("/transactions/", Some(Self::body(transaction)?)))
            .await
    }

    pub async fn top_spenders(&self) -> Result<Vec<TopSpender>, ApiError> {
        self.fetch(ApiRequest::get("/transactions/top-10-spenders/")).await
    }

    // ===== Businesses =====

    pub async fn businesses(&self) -> Result<Vec<Business>, ApiError> {
        self.fetch(ApiRequest::get("/businesses/")).await
    }

    pub async fn business(&self, id: &str) -> Result<Business, ApiError> {
        self.fetch(ApiRequest::get(format!("/businesses/{}/", id))).await
    }

    pub async fn create_business(&self, business: &NewBusiness) -> Result<Business, ApiError> {
        self.fetch(ApiRequest::post("/businesses/", Some(Self::body(business)?)))
            .await
    }

    pub async fn set_business_sanction(&self, id: &str, sanctioned: bool) -> Result<Business, ApiError> {
        self.fetch(ApiRequest::patch(
            format!("/businesses/{}/", id),
            json!({ "sanctioned": sanctioned }),
        ))
        .await
    }
}
