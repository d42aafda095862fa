use super::validation::validate_config;
use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn with_config_home<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", dir);
    }

    let result = f();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
    result
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("miqat").join("miqat.toml");

    let result = with_config_home(temp_dir.path(), Config::load);

    if let Err(e) = &result {
        eprintln!("Config::load() failed: {:?}", e);
    }
    let config = result.unwrap();
    assert!(config_path.exists());

    // Defaults written to the template parse back to the built-in defaults
    assert_eq!(config.calculation_method(), CalculationMethod::Isna);
    assert_eq!(config.coordinate(), None);
    assert_eq!(config.api_url(), DEFAULT_API_URL);
    assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT));
    assert_eq!(config.location_timeout(), Duration::from_secs(DEFAULT_LOCATION_TIMEOUT));
    assert_eq!(config.heading_debounce(), None);
}

#[test]
#[serial]
fn test_existing_config_is_not_overwritten() {
    let temp_dir = tempdir().unwrap();
    let config_dir = temp_dir.path().join("miqat");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("miqat.toml");
    fs::write(&config_path, "calculation_method = 4\nheading_debounce = 150\n").unwrap();

    let config = with_config_home(temp_dir.path(), Config::load).unwrap();

    assert_eq!(config.calculation_method(), CalculationMethod::UmmAlQura);
    assert_eq!(config.heading_debounce(), Some(Duration::from_millis(150)));
    let content = fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "calculation_method = 4\nheading_debounce = 150\n");
}

#[test]
fn test_default_template_round_trips_with_coordinates() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("miqat.toml");

    create_default_config(&path, Some((51.5074, -0.1278))).unwrap();
    let config = load_from_path(&path).unwrap();

    let coordinate = config.coordinate().unwrap();
    assert!((coordinate.latitude - 51.5074).abs() < 1e-6);
    assert!((coordinate.longitude + 0.1278).abs() < 1e-6);
}

#[test]
fn test_default_template_aligns_comments() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("miqat.toml");
    create_default_config(&path, None).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("#[Prayer times]"));
    assert!(content.contains("# latitude = 21.4225"));

    let comment_columns: Vec<usize> = content
        .lines()
        .filter(|line| !line.starts_with("#[") && !line.is_empty())
        .filter_map(|line| line.rfind(" # ").map(|i| i + 1))
        .collect();
    assert!(!comment_columns.is_empty());
    assert!(comment_columns.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_load_from_missing_path_fails() {
    let temp_dir = tempdir().unwrap();
    let result = load_from_path(&temp_dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_unparseable_config_reports_path() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("miqat.toml");
    fs::write(&path, "request_timeout = \"soon\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config"));
}

#[test]
fn test_config_validation_accepts_empty() {
    assert!(validate_config(&Config::default()).is_ok());
}

#[test]
fn test_config_validation_method() {
    let config = Config {
        calculation_method: Some(6),
        ..Default::default()
    };
    let err = validate_config(&config).unwrap_err().to_string();
    assert!(err.contains("calculation_method (6)"));

    let config = Config {
        calculation_method: Some(23),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_config_validation_coordinates() {
    let half = Config {
        latitude: Some(21.0),
        ..Default::default()
    };
    assert!(validate_config(&half).is_err());

    let out_of_range = Config {
        latitude: Some(91.0),
        longitude: Some(0.0),
        ..Default::default()
    };
    let err = validate_config(&out_of_range).unwrap_err().to_string();
    assert!(err.contains("latitude must be between -90 and 90"));

    let out_of_range = Config {
        latitude: Some(0.0),
        longitude: Some(-180.5),
        ..Default::default()
    };
    assert!(validate_config(&out_of_range).is_err());

    let edges = Config {
        latitude: Some(-90.0),
        longitude: Some(180.0),
        ..Default::default()
    };
    assert!(validate_config(&edges).is_ok());
}

#[test]
fn test_config_validation_timeouts() {
    for (request, location, ok) in [
        (Some(MINIMUM_REQUEST_TIMEOUT), None, true),
        (Some(MAXIMUM_REQUEST_TIMEOUT), None, true),
        (Some(0), None, false),
        (Some(MAXIMUM_REQUEST_TIMEOUT + 1), None, false),
        (None, Some(MINIMUM_LOCATION_TIMEOUT), true),
        (None, Some(0), false),
        (None, Some(MAXIMUM_LOCATION_TIMEOUT + 1), false),
    ] {
        let config = Config {
            request_timeout: request,
            location_timeout: location,
            ..Default::default()
        };
        assert_eq!(
            validate_config(&config).is_ok(),
            ok,
            "request={request:?} location={location:?}"
        );
    }
}

#[test]
fn test_config_validation_debounce_and_url() {
    let config = Config {
        heading_debounce: Some(MAXIMUM_HEADING_DEBOUNCE),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());

    let config = Config {
        heading_debounce: Some(MAXIMUM_HEADING_DEBOUNCE + 1),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        api_url: Some("ftp://example.test".to_string()),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        api_url: Some("http://localhost:8080/v1".to_string()),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());
}
