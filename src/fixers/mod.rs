pub mod candidate;
pub mod conflict;
pub mod sequencer;
pub mod verifier;

pub use sequencer::{FixApplicationResult, FixSequencer};
pub use verifier::{FixVerifier, VerificationResult, VerificationStatus};
