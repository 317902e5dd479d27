pub mod intent;
pub mod key;
pub mod models;

pub use intent::{classify_query, normalize_text, Classifier, RuleClassifier};
pub use key::{normalize_query, CacheKey, SYSTEM_SCOPE};
pub use models::*;
