pub mod classify;
pub mod cli;
pub mod config;
pub mod count;
pub mod detect;
pub mod engine;
pub mod manifest;
pub mod normalize;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod rules;
pub mod split_plan;
pub mod text;
pub mod util;
