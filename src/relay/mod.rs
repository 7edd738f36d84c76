//! HTTP relay module.
//!
//! Accepts analysis and message requests from callers, validates them, and
//! relays them to the configured upstream providers.

mod handlers;
mod server;
pub mod types;

pub use handlers::{
    COINSCOUT_LATENCY_MS_HEADER, COINSCOUT_PROVIDER_HEADER, COINSCOUT_REQUEST_ID_HEADER,
};
pub use server::{create_router, run_server, AppState, RequestId};
pub use types::{
    AnalysisResult, AnalyzeRequest, GenerateResponse, LiveData, MessageRequest, ReplyResponse,
};
