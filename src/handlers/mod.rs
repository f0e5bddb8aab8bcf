pub mod assistant;
pub mod normal;
pub mod repl;
pub mod run;
