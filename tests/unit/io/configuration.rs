//! Tests for pipeline configuration constants

#[cfg(test)]
mod tests {
    use crowdmosaic::io::configuration::{
        AGGREGATION_FILE, CONVERTED_FILE, DEFAULT_CLICKABLE_SIZE, DEFAULT_EM_TOLERANCE,
        DEFAULT_LABEL_THRESHOLD, DEFAULT_NUM_TO_COMBINE, DEFAULT_SEED, DEFAULT_SMOOTHING,
        DEFAULT_SUBINSTANCE_SIZE, IMAGE_EXTENSIONS, MAPPING_FILE, Q_DECREASE_TOLERANCE,
    };
    use crowdmosaic::spatial::geometry::TilingParams;

    // Tests the default clipping geometry passes validation
    // Verified by making the default clickable size odd
    #[test]
    fn test_default_geometry_valid() {
        let params = TilingParams::new(
            DEFAULT_SUBINSTANCE_SIZE,
            DEFAULT_CLICKABLE_SIZE,
            DEFAULT_NUM_TO_COMBINE,
            DEFAULT_SEED,
        )
        .unwrap();

        assert_eq!(params.expand(), 5);
        assert_eq!(params.mosaic_grid_size(), 20);
    }

    // Tests aggregation defaults lie in their valid ranges
    #[test]
    fn test_aggregation_defaults() {
        assert!(DEFAULT_EM_TOLERANCE > 0.0);
        assert!(Q_DECREASE_TOLERANCE < DEFAULT_EM_TOLERANCE);
        assert!((0.0..=1.0).contains(&DEFAULT_LABEL_THRESHOLD));
        assert!(DEFAULT_SMOOTHING >= 0.0);
    }

    // Tests persisted file names are distinct JSON files
    #[test]
    fn test_file_names() {
        let names = [MAPPING_FILE, CONVERTED_FILE, AGGREGATION_FILE];

        assert!(names.iter().all(|name| name.ends_with(".json")));
        assert_ne!(MAPPING_FILE, CONVERTED_FILE);
        assert_ne!(CONVERTED_FILE, AGGREGATION_FILE);
        assert!(IMAGE_EXTENSIONS.contains(&"png"));
    }
}
