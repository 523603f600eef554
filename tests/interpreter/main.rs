mod builtins;
mod control_flow;
mod functions;
mod helpers;
mod pipeline;
mod scopes;
