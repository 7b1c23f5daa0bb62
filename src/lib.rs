//! todosync - task synchronization client for a remote todo service
//!
//! This library authenticates a user, performs task CRUD against the remote
//! REST service and reconciles photos attached to tasks with records the
//! backend may not echo back correctly.
//!
//! # Modules
//!
//! * [`backend`] - Wire types, error taxonomy and the resilient API client
//! * [`upload`] - Image reduction and upload with field-name fallback
//! * [`sync`] - Task synchronization façade and image association cache
//! * [`session`] - Session credential with lazy one-time initialization
//! * [`storage`] - Key-value persistence (SQLite or in-memory)
//! * [`config`] - Application configuration management
//! * [`utils`] - URL normalization

/// Remote service client, transport and retry policies
pub mod backend;

/// Configuration module for managing application settings
pub mod config;

/// Application constants and default values
pub mod constants;

/// SeaORM entity models for database tables
pub mod entities;

/// Logging setup and in-memory log buffer
pub mod logger;

/// Repository layer for database operations
pub mod repositories;

/// Authenticated session state
pub mod session;

/// Local key-value persistence
pub mod storage;

/// Task synchronization façade
pub mod sync;

/// Image upload coordination
pub mod upload;

/// Utility helpers
pub mod utils;

pub use backend::{ApiClient, ApiError};
pub use sync::{CreateOutcome, ImageAdvisory, NewTask, Task, TaskSyncService};
