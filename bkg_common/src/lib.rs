pub mod helpers;
mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, VND_CURRENCY_CODE, VND_CURRENCY_CODE_LOWER};
pub use secret::Secret;
