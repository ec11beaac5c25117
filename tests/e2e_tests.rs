//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! script fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every command through a fresh marketplace
//! 3. Generates wallet output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path booking, completion and repeated completion
//! - Passengers who cannot pay on acceptance
//! - Overbooking attempts at request and acceptance time
//! - Actions by users who do not own the ride or booking
//! - Ride cancellation with refunds
//! - Suspended and banned accounts
//! - Malformed script lines
//!
//! Each fixture runs with a one-line batch size and with the default batch
//! size to show that batching does not change the result.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use ride_pool_engine::replay::{Replay, ReplayConfig};
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Replay tests/fixtures/{fixture_name}/input.csv and compare with expected.csv
    fn run_test_fixture(fixture_name: &str, batch_size: usize) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let replay = Replay::new(ReplayConfig::new(batch_size, 2));
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        replay
            .run(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay script: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (batch size: {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, batch_size, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("overbooking")]
    #[case("unauthorized")]
    #[case("ride_cancellation")]
    #[case("account_moderation")]
    #[case("malformed_data")]
    fn test_fixtures(#[case] fixture: &str, #[values(1, 1000)] batch_size: usize) {
        run_test_fixture(fixture, batch_size);
    }
}
