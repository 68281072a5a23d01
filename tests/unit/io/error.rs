//! Tests for error types including source chaining and message formatting

#[cfg(test)]
mod tests {
    use crowdmosaic::PipelineError;
    use crowdmosaic::io::error::{WithPath, computation_error, consistency_error, invalid_parameter};
    use std::error::Error;
    use std::path::PathBuf;

    // Tests error source chaining works correctly
    // Verified by breaking source chain
    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = PipelineError::FileSystem {
            path: "/tmp/mapping.json".into(),
            operation: "read",
            source: io_error,
        };

        assert!(error.source().is_some());
        assert!(consistency_error("tiling", &"count").source().is_none());
    }

    // Tests InvalidParameter error contains all fields
    // Verified by omitting value from message
    #[test]
    fn test_invalid_parameter_error() {
        let message = invalid_parameter("clickable_size", &7, &"must divide 50").to_string();

        assert!(message.contains("clickable_size"));
        assert!(message.contains('7'));
        assert!(message.contains("must divide 50"));
    }

    // Tests alignment errors report both index sizes
    #[test]
    fn test_alignment_error() {
        let error = PipelineError::Alignment {
            expected: 12,
            found: 9,
            reason: "cell indexes have different lengths".to_owned(),
        };

        let message = error.to_string();
        assert!(message.contains("12 vs 9"));
        assert!(message.contains("different lengths"));
    }

    // Tests stage and operation names reach the message
    #[test]
    fn test_stage_names_in_message() {
        assert!(
            consistency_error("mosaic assembly", &"slot reused")
                .to_string()
                .contains("mosaic assembly")
        );
        assert!(
            computation_error("EM", &"Q decreased")
                .to_string()
                .contains("Q decreased")
        );
    }

    // Tests with_path replaces the placeholder path of converted errors
    // Verified by leaving the placeholder in place
    #[test]
    fn test_with_path_replaces_placeholder() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));

        match result.with_path("/tmp/mapping.json") {
            Err(PipelineError::FileSystem { path, .. }) => {
                assert_eq!(path, PathBuf::from("/tmp/mapping.json"));
            }
            other => unreachable!("Expected FileSystem error, got {other:?}"),
        }
    }

    // Tests JSON errors convert into serialization errors
    #[test]
    fn test_json_error_conversion() {
        let result: std::result::Result<Vec<u8>, serde_json::Error> = serde_json::from_str("[1,");

        let error = result.with_path("responses.json").unwrap_err();
        assert!(matches!(error, PipelineError::Serialization { .. }));
        assert!(error.to_string().contains("responses.json"));
    }
}
