use demand_forecast::error::ForecastError;
use forecast_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match ForecastError::from(io_error) {
        ForecastError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    match ForecastError::from(json_error) {
        ForecastError::SerializationError(_) => {}
        other => panic!("Expected SerializationError variant, got {:?}", other),
    }

    let chrono_error = chrono::NaiveDate::parse_from_str("x", "%Y-%m-%d").unwrap_err();
    match ForecastError::from(chrono_error) {
        ForecastError::ParseError(_) => {}
        other => panic!("Expected ParseError variant, got {:?}", other),
    }
}

#[test]
fn test_math_errors_map_to_taxonomy() {
    let not_converged = MathError::DidNotConverge {
        iterations: 10,
        reason: "budget".to_string(),
    };
    assert!(matches!(
        ForecastError::from(not_converged),
        ForecastError::ConvergenceError(_)
    ));

    let singular = MathError::NotPositiveDefinite { dimension: 2 };
    assert!(matches!(
        ForecastError::from(singular),
        ForecastError::ConvergenceError(_)
    ));

    let line_search = MathError::OptimizerFailed("no acceptable step".to_string());
    match ForecastError::from(line_search) {
        ForecastError::ConvergenceError(msg) => assert!(msg.contains("no acceptable step")),
        other => panic!("Expected ConvergenceError variant, got {:?}", other),
    }

    assert!(matches!(
        ForecastError::from(MathError::InvalidInput("bad".to_string())),
        ForecastError::InvalidArgument(_)
    ));
    assert!(matches!(
        ForecastError::from(MathError::InsufficientData("short".to_string())),
        ForecastError::InsufficientData(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidArgument("Horizon must cover at least one period".to_string());
    let error_string = format!("{}", error);
    assert!(error_string.contains("Invalid argument"));
    assert!(error_string.contains("at least one period"));

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error_string = format!("{}", ForecastError::from(io_error));
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));
}
