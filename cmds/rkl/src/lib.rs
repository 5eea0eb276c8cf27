pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod k8s;
pub mod project;
pub mod status;
pub mod task_group;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
