use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_verbosity_from_count() {
    assert_eq!(VerbosityLevel::from_count(0), VerbosityLevel::Normal);
    assert_eq!(VerbosityLevel::from_count(1), VerbosityLevel::Verbose);
    assert_eq!(VerbosityLevel::from_count(2), VerbosityLevel::Debug);
    assert_eq!(VerbosityLevel::from_count(3), VerbosityLevel::Trace);
    assert_eq!(VerbosityLevel::from_count(9), VerbosityLevel::Trace);
}

#[test]
fn test_filter_directive() {
    assert_eq!(VerbosityLevel::Normal.filter_directive(), "warn");
    assert!(VerbosityLevel::Verbose
        .filter_directive()
        .contains("libreap=info"));
    assert!(VerbosityLevel::Debug
        .filter_directive()
        .contains("libreap=debug"));
}

#[test]
fn test_explicit_config_path_wins() {
    let path = Path::new("/tmp/some/reap.yaml");
    assert_eq!(config_path(Some(path)), Some(path.to_path_buf()));
}

#[test]
fn test_default_config_path_location() {
    if let Some(path) = default_config_path() {
        assert!(path.ends_with("reap/config.yaml"));
    }
}

#[test]
fn test_build_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "output:\n  format: json\n  color: never\npurge:\n  concurrency: 3"
    )
    .unwrap();

    let ctx = AppContext::build(Some(file.path()), None).unwrap();

    assert_eq!(ctx.config.purge.concurrency, 3);
    assert_eq!(ctx.color, ColorChoice::Never);
    assert_eq!(ctx.output_format(None), OutputFormat::Json);
    assert_eq!(
        ctx.output_format(Some(OutputFormat::Pretty)),
        OutputFormat::Pretty
    );
}

#[test]
fn test_cli_color_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "output:\n  color: never").unwrap();

    let ctx = AppContext::build(Some(file.path()), Some(ColorChoice::Always)).unwrap();
    assert_eq!(ctx.color, ColorChoice::Always);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppContext::build(Some(&dir.path().join("absent.yaml")), None);
    assert!(result.is_err());
}
