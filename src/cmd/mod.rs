//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                                      |
//! |-------------|-------------------------------------------------------|
//! | `project`   | `Init`                                                |
//! | `config`    | `Config`                                              |
//! | `profile`   | `Profile`                                             |
//! | `execution` | `Start`, `Evaluate`, `Advance`, `Seek`, `Status`, `Cancel` |
//! | `history`   | `History`                                             |
//! | `session`   | Shared database + orchestrator wiring                 |

pub mod config;
pub mod execution;
pub mod history;
pub mod profile;
pub mod project;
pub mod session;

pub use config::cmd_config;
pub use execution::{cmd_advance, cmd_cancel, cmd_evaluate, cmd_seek, cmd_start, cmd_status};
pub use history::cmd_history;
pub use profile::cmd_profile;
pub use project::cmd_init;
pub use session::Session;
