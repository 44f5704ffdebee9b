use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::QPayConfig,
    data_objects::{CreatePaymentLinkRequest, PaymentLinkDetail, QPayResponse},
    QPayApiError,
};

/// The payment-link operations the booking server needs from the gateway. `QPayApi` is the real
/// implementation; tests substitute a mock.
#[allow(async_fn_in_trait)]
pub trait PaymentLinkProvider: Clone {
    /// Creates a hosted-checkout link for a new payment attempt.
    async fn create_payment_link(&self, request: &CreatePaymentLinkRequest) -> Result<PaymentLinkDetail, QPayApiError>;
    /// Fetches the current state of a link. This is the poll path's upstream call.
    async fn payment_link_status(&self, order_code: &str) -> Result<PaymentLinkDetail, QPayApiError>;
    /// Kills a live link upstream, e.g. before issuing a replacement for the same booking.
    async fn cancel_payment_link(
        &self,
        order_code: &str,
        reason: Option<&str>,
    ) -> Result<PaymentLinkDetail, QPayApiError>;
}

#[derive(Clone)]
pub struct QPayApi {
    config: QPayConfig,
    client: Arc<Client>,
}

impl QPayApi {
    pub fn new(config: QPayConfig) -> Result<Self, QPayApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let client_id = HeaderValue::from_str(config.client_id.as_str())
            .map_err(|e| QPayApiError::Initialization(e.to_string()))?;
        let api_key = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| QPayApiError::Initialization(e.to_string()))?;
        headers.insert("x-client-id", client_id);
        headers.insert("x-api-key", api_key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| QPayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, QPayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| QPayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| QPayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| QPayApiError::RestResponseError(e.to_string()))?;
            Err(QPayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v2{path}", self.config.api_url)
    }
}

impl PaymentLinkProvider for QPayApi {
    async fn create_payment_link(&self, request: &CreatePaymentLinkRequest) -> Result<PaymentLinkDetail, QPayApiError> {
        debug!("Creating payment link for order {}", request.order_code);
        let response = self
            .rest_query::<QPayResponse<PaymentLinkDetail>, _>(Method::POST, "/payment-requests", Some(request))
            .await?;
        let link = response.into_result()?;
        info!("Created payment link {} for order {}", link.link_id, link.order_code);
        Ok(link)
    }

    async fn payment_link_status(&self, order_code: &str) -> Result<PaymentLinkDetail, QPayApiError> {
        let path = format!("/payment-requests/{order_code}");
        debug!("Fetching payment link status for order {order_code}");
        let response = self.rest_query::<QPayResponse<PaymentLinkDetail>, ()>(Method::GET, &path, None).await?;
        response.into_result()
    }

    async fn cancel_payment_link(
        &self,
        order_code: &str,
        reason: Option<&str>,
    ) -> Result<PaymentLinkDetail, QPayApiError> {
        let path = format!("/payment-requests/{order_code}/cancel");
        let body = serde_json::json!({ "cancellation_reason": reason.unwrap_or("superseded") });
        debug!("Cancelling payment link for order {order_code}");
        let response =
            self.rest_query::<QPayResponse<PaymentLinkDetail>, _>(Method::POST, &path, Some(body)).await?;
        let link = response.into_result()?;
        info!("Cancelled payment link for order {order_code}");
        Ok(link)
    }
}
