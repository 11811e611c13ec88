//! Utility modules for siumai-fallback
//!
//! This module contains cancellation helpers shared by models and the retry loop.

pub mod cancel;

pub use cancel::{AbortSignal, SignalOrigin, abortable_stream};
