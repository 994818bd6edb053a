pub mod token;

pub use token::{EntropySource, FallbackPolicy, OsEntropy, Token, TokenGenerator};
