mod build;
pub use build::build_artifact;
mod planner;
pub use planner::{ExecutionPlan, ExecutionPlanner, OUTPUT_DIR_ENV};
mod process;
pub use process::{run_shell, ExecEnv, RunOutcome};
mod runner;
pub use runner::{execute_plan, ExperimentRunner};
