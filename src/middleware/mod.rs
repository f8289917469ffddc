pub mod api_key;
pub mod tracking;

pub use tracking::RequestId;
