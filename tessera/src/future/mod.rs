//! Adapters turning callback-style asynchronous operations into futures that
//! a task can `.await`.

mod callback;
pub use callback::{CallbackAwaiter, ResultSetter, ResumeSignal};
