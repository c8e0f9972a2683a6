use crate::error::format::format_error_with_color;
use crate::error::*;

#[test]
fn test_error_context_unknown_check() {
    let error = HabitatError::UnknownCheck("on_beos".to_string());
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.is_some());
    assert!(context.suggestion.unwrap().contains("habitat list"));
    assert!(context.details.unwrap().contains("on_beos"));
}

#[test]
fn test_error_context_path_not_found() {
    let error = HabitatError::PathNotFound("/tmp/missing.bin".to_string());
    let context = ErrorContext::new(&error);

    assert!(context.details.unwrap().contains("/tmp/missing.bin"));
    assert!(context.suggestion.unwrap().contains("--path"));
}

#[test]
fn test_error_context_permission_denied() {
    let error = HabitatError::PermissionDenied("/root/secret".to_string());
    let context = ErrorContext::new(&error);

    let suggestion = context.suggestion.unwrap();
    if cfg!(unix) {
        assert!(suggestion.contains("ls -l"));
    } else {
        assert!(suggestion.contains("account"));
    }
}

#[test]
fn test_error_context_without_suggestion() {
    let error = HabitatError::Render("zero sized canvas".to_string());
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.is_none());
    assert!(context.details.is_none());
    assert_eq!(context.to_string(), "Error: Render failed: zero sized canvas");
}

#[test]
fn test_format_error_chain_includes_details() {
    let error = HabitatError::InvalidConfig("probe.shell_timeout_secs must be > 0".to_string());
    let formatted = format_error_chain(&error);

    assert!(formatted.starts_with("Error: Invalid configuration"));
    assert!(formatted.contains("Details: probe.shell_timeout_secs"));
    assert!(formatted.contains("Suggestion:"));
}

#[test]
fn test_format_error_with_color() {
    let error = HabitatError::LaunchFailed {
        program: "xdg-open".to_string(),
        reason: "not found".to_string(),
    };

    let plain = format_error_with_color(&error, false);
    assert!(plain.starts_with("Error: Failed to launch 'xdg-open'"));
    assert!(plain.contains("\nSuggestions:\n• Ensure 'xdg-open' is installed"));
    assert!(!plain.contains("\x1b["));

    // colored may still be switched off by NO_COLOR; the text survives either way
    let styled = format_error_with_color(&error, true);
    assert!(styled.contains("Error:"));
    assert!(styled.contains("Ensure 'xdg-open' is installed"));
}

#[test]
fn test_format_error_with_color_details() {
    let error = HabitatError::NotAFile("/tmp".to_string());
    let plain = format_error_with_color(&error, false);

    assert!(plain.contains("\nInspected path: /tmp\n"));
    assert_eq!(plain.matches("• ").count(), 1);
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        get_exit_code(&HabitatError::UnknownCheck("x".to_string())),
        2
    );
    assert_eq!(
        get_exit_code(&HabitatError::NotAFile("/tmp".to_string())),
        3
    );
    assert_eq!(
        get_exit_code(&HabitatError::PermissionDenied("x".to_string())),
        13
    );
    assert_eq!(
        get_exit_code(&HabitatError::Timeout("shell".to_string())),
        124
    );
    assert_eq!(
        get_exit_code(&HabitatError::SystemError("boom".to_string())),
        1
    );
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: HabitatError = io.into();
    assert!(matches!(error, HabitatError::Io(_)));
    assert_eq!(error.to_string(), "gone");
}
