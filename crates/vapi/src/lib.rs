//! Vapi outbound calls, exposed as an MCP tool.
//!
//! [`CallInitiator`] validates a destination number and task, then creates
//! one call through the Vapi REST API. [`CallTools`] wraps it as the
//! `make_call` tool for an [`mcp::Server`].
//!
//! # Example
//!
//! ```no_run
//! use vapi::{CallInitiator, Config};
//!
//! # async fn example() -> vapi::Result<()> {
//! let initiator = CallInitiator::new(Config::from_env()?)?;
//! let started = initiator
//!     .initiate("+12345678900", "Confirm tomorrow's 3pm appointment")
//!     .await?;
//! println!("call id: {}", started.call_id);
//! # Ok(())
//! # }
//! ```

mod api;
mod call;
pub mod config;
mod error;
mod tool;

pub use call::{CallInitiator, CallRequest, CallResult, CallStarted};
pub use config::{AssistantConfig, Config};
pub use error::{Error, Result};
pub use tool::{CallTools, MAKE_CALL};
