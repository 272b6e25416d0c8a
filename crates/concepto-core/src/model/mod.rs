pub mod node;
pub mod result;
pub mod state;

pub use node::{Arrow, Cloud, FieldValue, Font, Node};
pub use result::{Emission, ExecutionResult, HandlerError, HandlerResult, Reply};
pub use state::{ExecContext, StateMap};
