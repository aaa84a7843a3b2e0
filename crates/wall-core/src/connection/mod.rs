//! Connection bookkeeping: outbound queue, pending-callback table, retry
//! policy, and the [`Multiplexer`] state machine that ties them together.

pub mod correlator;
pub mod queue;
pub mod retry;
pub mod state;

pub use correlator::PendingTable;
pub use queue::OutboundQueue;
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy, DEFAULT_RETRY_DELAY};
pub use state::{Generation, Inbound, LinkState, Multiplexer, Submission};
