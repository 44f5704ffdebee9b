use thiserror::Error;

#[derive(Debug, Error)]
pub enum QPayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("QPay rejected the request. Code {code}: {desc}")]
    GatewayError { code: String, desc: String },
    #[error("The gateway response carried no data")]
    EmptyResponse,
}
