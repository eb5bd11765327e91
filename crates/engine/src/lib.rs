//! Delve Engine library.
//!
//! Server-side code of the Delve game and combat services.
//!
//! ## Structure
//!
//! - `use_cases/` - Game progression and the combat worker
//! - `infrastructure/` - Broker and HTTP adapters behind port traits
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
