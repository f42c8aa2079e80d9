pub mod history;
pub mod onboard;
pub mod run;
pub mod runtime;
pub mod tools;
