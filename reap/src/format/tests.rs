use super::*;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
struct TestData {
    name: String,
    value: i32,
}

impl Formattable for TestData {
    fn format_pretty(&self) -> String {
        format!("{}: {}", self.name, self.value)
    }
}

#[test]
fn test_output_format_from_config() {
    assert_eq!(
        OutputFormat::from(libreap::config::OutputFormat::Json),
        OutputFormat::Json
    );
    assert_eq!(
        ColorChoice::from(libreap::config::ColorChoice::Never),
        ColorChoice::Never
    );
}

#[test]
fn test_format_pretty() {
    let data = TestData {
        name: "test".to_string(),
        value: 42,
    };
    assert_eq!(format_output(&data, OutputFormat::Pretty).unwrap(), "test: 42");
}

#[test]
fn test_format_json() {
    let data = TestData {
        name: "test".to_string(),
        value: 42,
    };
    let result = format_output(&data, OutputFormat::Json).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result).unwrap();
    assert_eq!(json["name"], "test");
    assert_eq!(json["value"], 42);
}

#[test]
fn test_formatters_do_not_panic() {
    for color in [ColorChoice::Always, ColorChoice::Never, ColorChoice::Auto] {
        let formatter = create_formatter(color);
        formatter.warning("careful");
        formatter.error("failed");
    }
}
