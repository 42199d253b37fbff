//! The check-in wizard. [controller::WizardController] owns a [session::Session] and walks it
//! through the questions, the notes and the final submission. Rendering lives in the cli module,
//! this module only knows about state.

pub mod controller;
pub mod record;
pub mod session;
