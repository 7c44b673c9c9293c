//! Record image captioning worker
//!
//! Scans the `records` table for rows without an image description, follows
//! each row's manifest to its image, captions the image with Cloudflare
//! Workers AI and writes back either the caption or a permanent failure
//! marker.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
