//! Tests for command-line parsing and stage settings

#[cfg(test)]
mod tests {
    use clap::Parser;
    use crowdmosaic::aggregation::result::AggregationMethod;
    use crowdmosaic::alignment::aligner::NegativePolicy;
    use crowdmosaic::analysis::information_loss::Distance;
    use crowdmosaic::io::cli::{Cli, Command, check_images_match};
    use crowdmosaic::io::configuration::{DEFAULT_MAX_EM_ITERATIONS, DEFAULT_SEED};
    use crowdmosaic::spatial::geometry::{ImageDims, SourceImage, TilingParams};
    use crowdmosaic::spatial::mosaic::MappingTable;
    use log::LevelFilter;
    use std::path::PathBuf;

    // Tests clip defaults and the geometry-named run directory
    // Verified by naming the run directory after the seed
    #[test]
    fn test_clip_defaults() {
        let cli = Cli::try_parse_from(["crowdmosaic", "clip", "images"]).unwrap();

        let Command::Clip(args) = cli.command else {
            unreachable!("Expected clip command");
        };
        assert_eq!(args.images, PathBuf::from("images"));
        assert_eq!(args.seed, DEFAULT_SEED);
        assert_eq!(args.run_dir(), PathBuf::from(".").join("50_10_4"));
    }

    // Tests short geometry flags
    #[test]
    fn test_clip_flags() {
        let cli = Cli::try_parse_from([
            "crowdmosaic", "clip", "images", "-o", "out", "-s", "20", "-c", "5", "-k", "2",
        ])
        .unwrap();

        let Command::Clip(args) = cli.command else {
            unreachable!("Expected clip command");
        };
        assert_eq!(args.run_dir(), PathBuf::from("out").join("20_5_2"));
    }

    // Tests verbosity flags map onto log levels
    // Verified by treating -vv like -v
    #[test]
    fn test_log_levels() {
        let plain = Cli::try_parse_from(["crowdmosaic", "clip", "images"]).unwrap();
        let trace = Cli::try_parse_from(["crowdmosaic", "-vv", "clip", "images"]).unwrap();
        let debug = Cli::try_parse_from(["crowdmosaic", "clip", "images", "-v"]).unwrap();
        let quiet = Cli::try_parse_from(["crowdmosaic", "-q", "clip", "images"]).unwrap();

        assert!(!plain.verbosity_given());
        assert_eq!(plain.log_level(), LevelFilter::Info);
        assert_eq!(trace.log_level(), LevelFilter::Trace);
        assert_eq!(debug.log_level(), LevelFilter::Debug);
        assert_eq!(quiet.log_level(), LevelFilter::Error);
        assert!(quiet.verbosity_given());
    }

    // Tests aggregation flags reach the aggregation options
    #[test]
    fn test_aggregate_options() {
        let cli = Cli::try_parse_from([
            "crowdmosaic",
            "aggregate",
            "run",
            "--method",
            "mv",
            "--strict",
            "--seed",
            "9",
        ])
        .unwrap();

        let Command::Aggregate(args) = cli.command else {
            unreachable!("Expected aggregate command");
        };
        let options = args.options();
        assert_eq!(options.method, AggregationMethod::MajorityVote);
        assert_eq!(options.seed, 9);
        assert!(options.em.strict_validation);
        assert_eq!(options.em.max_iterations, DEFAULT_MAX_EM_ITERATIONS);
    }

    // Tests the default method is the latent class model
    #[test]
    fn test_aggregate_default_method() {
        let cli = Cli::try_parse_from(["crowdmosaic", "aggregate", "run"]).unwrap();

        let Command::Aggregate(args) = cli.command else {
            unreachable!("Expected aggregate command");
        };
        assert_eq!(args.options().method, AggregationMethod::LatentClass);
        assert!(!args.strict);
    }

    // Tests convert policy selection and its default
    #[test]
    fn test_convert_policy() {
        let default = Cli::try_parse_from(["crowdmosaic", "convert", "run", "-r", "r.json"]).unwrap();
        let explicit = Cli::try_parse_from([
            "crowdmosaic",
            "convert",
            "run",
            "-r",
            "r.json",
            "--policy",
            "positive-only",
        ])
        .unwrap();

        let (Command::Convert(default), Command::Convert(explicit)) =
            (default.command, explicit.command)
        else {
            unreachable!("Expected convert commands");
        };
        assert_eq!(default.policy, NegativePolicy::ClosedWorld);
        assert_eq!(explicit.policy, NegativePolicy::PositiveOnly);
        assert_eq!(explicit.responses, PathBuf::from("r.json"));
    }

    // Tests evaluate parsing and rejection of unknown values
    #[test]
    fn test_evaluate_arguments() {
        let cli =
            Cli::try_parse_from(["crowdmosaic", "evaluate", "a.json", "b.json", "-d", "l1"]).unwrap();

        let Command::Evaluate(args) = cli.command else {
            unreachable!("Expected evaluate command");
        };
        assert_eq!(args.distance, Distance::L1);
        assert!(Cli::try_parse_from(["crowdmosaic", "evaluate", "a.json", "b.json", "-d", "l3"]).is_err());
        assert!(Cli::try_parse_from(["crowdmosaic", "aggregate", "run", "-m", "em"]).is_err());
    }

    // Tests rendering refuses a different image set than the run was clipped from
    // Verified by comparing only the image count
    #[test]
    fn test_check_images_match() {
        let params = TilingParams::new(20, 10, 1, 0).unwrap();
        let images = vec![
            SourceImage::new(0, "a.png", ImageDims::new(20, 20), &params),
            SourceImage::new(1, "b.png", ImageDims::new(20, 20), &params),
        ];
        let table = MappingTable::build(params, images).unwrap();

        assert!(check_images_match(&table, &["a.png", "b.png"]).is_ok());
        assert!(check_images_match(&table, &["b.png", "a.png"]).is_err());
        assert!(check_images_match(&table, &["a.png"]).is_err());
    }
}
