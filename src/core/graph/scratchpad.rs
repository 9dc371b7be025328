use super::Step;

pub const STEP_SEPARATOR: &str = "\n-----------\n";

/// Render completed steps for the next router prompt; proposed steps are skipped.
pub fn create_scratchpad(steps: &[Step]) -> String {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Completed { action, output } => Some(format!(
                "Tool: {}, input: {}\nOutput: {}",
                action.tool,
                action.input.to_args(),
                output
            )),
            Step::Proposed(_) => None,
        })
        .collect::<Vec<_>>()
        .join(STEP_SEPARATOR)
}
