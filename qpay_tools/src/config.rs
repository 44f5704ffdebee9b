use bkg_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct QPayConfig {
    pub api_url: String,
    pub client_id: String,
    pub api_key: Secret<String>,
    /// Key for the HMAC-SHA256 signature on webhook bodies and checkout requests.
    pub checksum_key: Secret<String>,
}

impl QPayConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("TBS_QPAY_API_URL").unwrap_or_else(|_| {
            warn!("TBS_QPAY_API_URL not set, using the sandbox endpoint as default");
            "https://api-sandbox.qpay.vn".to_string()
        });
        let client_id = std::env::var("TBS_QPAY_CLIENT_ID").unwrap_or_else(|_| {
            warn!("TBS_QPAY_CLIENT_ID not set, using (probably useless) default");
            "qpay-client-00000000".to_string()
        });
        let api_key = Secret::new(std::env::var("TBS_QPAY_API_KEY").unwrap_or_else(|_| {
            warn!("TBS_QPAY_API_KEY not set, using (probably useless) default");
            "qpk_00000000000000".to_string()
        }));
        let checksum_key = Secret::new(std::env::var("TBS_QPAY_CHECKSUM_KEY").unwrap_or_else(|_| {
            warn!("TBS_QPAY_CHECKSUM_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        Self { api_url, client_id, api_key, checksum_key }
    }
}
