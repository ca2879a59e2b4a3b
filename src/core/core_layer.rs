// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "registrations/mod.rs"]
pub mod registrations;

#[path = "sheets/mod.rs"]
pub mod sheets;
