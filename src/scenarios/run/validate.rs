use super::exec::ExecutionResult;
use crate::scenarios::ScenarioExpect;

/// Compare a run against its expectations.
///
/// Every check runs; the returned list holds one entry per failed check and
/// is empty on success.
pub fn verify(result: &ExecutionResult, expect: &ScenarioExpect) -> Vec<String> {
    let mut failures = Vec::new();

    if result.timed_out {
        failures.push(format!("timed out after {} ms", result.duration_ms));
    }

    validate_exact(
        &result.stderr,
        expect.expected_stderr.as_deref(),
        "stderr",
        &mut failures,
    );
    validate_exact(
        &result.stdout,
        expect.expected_stdout.as_deref(),
        "stdout",
        &mut failures,
    );

    if expect.expected_failure {
        if result.exit_code == Some(0) {
            failures.push("expected a failing exit, observed exit_code 0".to_string());
        }
    } else if !result.timed_out && result.exit_code != Some(0) {
        failures.push(format!(
            "expected exit_code 0, observed {}",
            describe_exit(result)
        ));
    }

    failures
}

fn validate_exact(
    observed: &[u8],
    expected: Option<&str>,
    label: &str,
    failures: &mut Vec<String>,
) {
    let Some(expected) = expected.filter(|value| !value.is_empty()) else {
        return;
    };
    if observed != expected.as_bytes() {
        failures.push(format!(
            "{label} mismatch: expected {:?}, observed {:?}",
            expected,
            String::from_utf8_lossy(observed)
        ));
    }
}

fn describe_exit(result: &ExecutionResult) -> String {
    match (result.exit_code, result.exit_signal) {
        (Some(code), _) => code.to_string(),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "no exit status".to_string(),
    }
}
