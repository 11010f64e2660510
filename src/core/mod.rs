pub mod change_detector;
pub mod evidence;
pub mod listing_filter;
pub mod price_parser;
pub mod verification;

pub use change_detector::detect;
pub use evidence::{EvidenceClassifier, EvidenceVerdict};
pub use listing_filter::ListingFilter;
pub use price_parser::parse_price;
pub use verification::{VerificationOutcome, VerificationScheduler};
