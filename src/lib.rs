//! Clarity AI upscaler node.
//!
//! Takes a host image tensor plus node parameters, submits them to the
//! Clarity AI API as a multipart request, polls asynchronous jobs and hands
//! the result back as an RGBA tensor (or raw video bytes).
//!
//! ```ignore
//! use clarity_upscale::{ClarityClient, ClarityConfig, ImageTensor, UpscaleOptions};
//!
//! let client = ClarityClient::new(ClarityConfig::from_env()?)?;
//! let upscaled = client
//!     .upscale(ImageTensor::filled(64, 64, 3, 0.5), UpscaleOptions::new())
//!     .await?;
//! ```

pub mod clarity;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;

pub use clarity::{ClarityClient, RawResponse, ReqwestTransport, Transport};
pub use config::ClarityConfig;
pub use error::{ClarityError, ErrorKind, Result};
pub use models::*;
