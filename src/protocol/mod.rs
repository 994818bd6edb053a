pub mod checkout;
pub mod message;
pub mod state;
pub mod transcript;
pub mod validator;
