//! Use-case services on top of the entity model.
//!
//! # Responsibility
//! - Turn entity state into vault writes (task creation, completion,
//!   recurrence re-creation).
//! - Keep callers decoupled from template and path details.

pub mod task_service;

pub use task_service::{
    clean_task_name, recurrent_task_title, TaskService, TaskServiceError, TaskServiceResult,
};
