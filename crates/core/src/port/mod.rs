// Port Layer - Interfaces for external collaborators

pub mod completion;
pub mod time_provider;

// Re-exports
pub use completion::{CompletionSink, ItemReport, TaskOutcome, TracingCompletionSink};
pub use time_provider::TimeProvider;
