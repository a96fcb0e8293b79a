pub mod case;
pub mod file;
pub mod problem;
pub mod program;
pub mod run;
pub mod session;
pub mod shared;
pub mod statement;
