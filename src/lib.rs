//! qrcraft: turns a URL and a prompt into an AI-styled QR code by proxying
//! to a hosted diffusion model and waiting for the prediction to finish.

pub mod api;
pub mod config;
pub mod model;
pub mod provider;
pub mod submitter;
