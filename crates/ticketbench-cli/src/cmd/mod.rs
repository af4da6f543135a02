pub mod completions;
pub mod get;
pub mod rpc;
pub mod run;
