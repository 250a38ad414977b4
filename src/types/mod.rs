pub mod error;
pub mod term;

pub use error::{
    ErrorCategory, ErrorClassifier, LexError, ProviderError, ProviderFailure, Result,
};
pub use term::{CompactTerm, Verdict};
