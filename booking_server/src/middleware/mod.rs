mod qpay_sig;

pub use qpay_sig::{SignatureMiddlewareFactory, SignatureMiddlewareService, QPAY_SIGNATURE_HEADER};
