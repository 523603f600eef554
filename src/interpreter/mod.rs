mod budget;
mod builtins;
mod console;
mod environment;
mod stack;
mod tree_walker;
mod value;

pub use budget::{BudgetExceeded, ExecutionBudget};
pub use builtins::{global_environment, BuiltIn};
pub use console::{capture, CapturedOutput, Console, OutputLimitExceeded};
pub use environment::{Environment, ScopeGuard};
pub use tree_walker::{Context, Interpreter, RuntimeError, PROGRAM_CONTEXT};
pub use value::{Function, List, Number, OperationError, Value};
