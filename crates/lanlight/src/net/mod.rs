mod endpoint;
mod stats;
mod tracking;

pub use endpoint::{MAX_DATAGRAM_SIZE, NetworkEndpoint};
pub use stats::{NetworkStats, rand_source, rand_u64};
pub use tracking::{
    CorrelationKey, Delivered, Pending, PendingTable, RequestError, Resolution, ResponseSink,
    SequenceCounter,
};
