//! Display and persistence traits - consumer-side external interfaces
//!
//! Both run on their own sink thread and are driven synchronously.

use crate::{ContractError, ConvertedFramePair, OperatorKey};

/// On-screen (or equivalent) presentation of converted pairs.
pub trait FrameDisplay: Send {
    /// Display name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Present one converted pair
    ///
    /// # Errors
    /// Returns render error (should include context)
    fn render(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError>;

    /// Non-blocking check for operator input since the last call
    fn poll_key(&mut self) -> Option<OperatorKey>;
}

/// Synchronous, success-or-error persistence; the caller does not retry.
pub trait FrameStore: Send {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one converted pair
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn save(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    fn flush(&mut self) -> Result<(), ContractError>;

    /// Close store
    fn close(&mut self) -> Result<(), ContractError>;
}
