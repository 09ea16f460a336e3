//! MAYA media generation service
//!
//! Accepts image and video generation requests, runs them against a
//! configured render backend (local ComfyUI, xAI, Pika or a mock) in the
//! background, and lets clients poll each job until it is ready or failed.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
