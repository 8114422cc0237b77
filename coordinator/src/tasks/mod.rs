//! Task lifecycle: idempotent creation, status transitions and their
//! side effects, and the planning sub-state.

pub mod create;
pub mod planning;
pub mod transition;
pub mod validate;
