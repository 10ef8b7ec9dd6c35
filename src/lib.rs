//! Retube - Channel Mirroring Daemon
//!
//! Watches a source channel for newly uploaded videos and re-uploads them to
//! a destination channel using yt-dlp and the YouTube Data API, with optional
//! description rewriting and scheduled publication.

pub mod auth;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod rewrite;
pub mod state;
pub mod upload;
pub mod watcher;
