//! The conversation loop at the center of TaskPilot.
//!
//! A task execution follows a **call → interpret → dispatch** cycle:
//!
//! 1. **Seed** the conversation (system prompt + history + request)
//! 2. **Call** the model via the configured provider
//! 3. **Interpret** the reply: structured tool calls, else the text markers
//! 4. **Dispatch** each new invocation once, append the results, go to 2
//!
//! The loop stops on a plain answer, an unrecoverable model failure, or the
//! iteration limit.

pub mod dispatcher;
pub mod interpreter;
pub mod prompt;
pub mod runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{Dispatch, Dispatcher};
pub use interpreter::{
    ARGUMENTS_MARKER, CALL_MARKER, Interpretation, InvocationSource, MalformedToolSyntax, interpret,
    parse,
};
pub use runner::TaskRunner;
