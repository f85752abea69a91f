// Domain layer - Pure state machines, no I/O
pub mod activity;
pub mod alert;
pub mod co_guard;
pub mod history;
pub mod retention;
pub mod sample;
pub mod settings;
pub mod thresholds;
