pub mod app;
pub mod core;
pub mod git;
pub mod github;
pub mod jobs;
pub mod queue;
pub mod replay;
pub mod scanner;
pub mod workspace;
