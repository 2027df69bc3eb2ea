//! The conversation: states, prompts and the controller that drives them.

pub mod controller;
pub mod prompts;
pub mod state;

pub use controller::Dialog;
pub use state::{DialogState, Sessions};
