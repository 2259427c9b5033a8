//! Human-readable error descriptions and structured JSON error formatting.

use putt_core::error::{BuildError, CourseError};

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_CONFIG: i32 = 3;
pub const EXIT_PAYLOAD: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDriver | BuildError::MissingStore => format!(
                "What happened: {be}.\nLikely causes: The PWM bus or course storage was not wired into the builder.\nHow to fix: This is a wiring bug in the binary; report it with the full log."
            ),
            BuildError::MissingMotor(which) => format!(
                "What happened: No {which} motor was provided.\nLikely causes: The servo on the motors chip failed to construct.\nHow to fix: Check [motors] in the config."
            ),
            BuildError::MissingInput(id) => format!(
                "What happened: Sensor input {} was not wired.\nLikely causes: A switch line failed to open.\nHow to fix: Check the sensor wiring and rerun self-check.",
                id.name()
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Rollout groups, chip addresses or scheduler periods out of range.\nHow to fix: Edit the config file, then rerun `putt self-check`."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CourseError>() {
        return match ce {
            CourseError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A missing, misspelled or out-of-range key in the TOML.\nHow to fix: Edit the config file, then rerun `putt self-check`."
            ),
            CourseError::Payload(msg) => format!(
                "What happened: The request body was rejected ({msg}).\nLikely causes: Wrong length, unknown mode byte, or a value out of range.\nHow to fix: A course state is 46 bytes starting with mode 00; dispense takes one byte 0..=10; settings take 00 or 01."
            ),
            CourseError::Storage(msg) => format!(
                "What happened: Course storage failed ({msg}).\nLikely causes: Unwritable [storage] course_state_path or a corrupt saved course.\nHow to fix: Check the path and permissions; delete the file to start from a flat course."
            ),
            CourseError::Hardware(msg) => format!(
                "What happened: A PWM chip or motor did not respond ({msg}).\nLikely causes: Wrong chip address or PWM frequency.\nHow to fix: Check [actuators] chip_addresses, osc_freq_hz and pwm_freq_hz."
            ),
        };
    }

    // String-based heuristics for errors coming from init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("init pwm chip") {
        return format!(
            "What happened: Failed to bring up a PWM chip ({msg}).\nLikely causes: Wrong chip address, or a PWM frequency the oscillator cannot reach.\nHow to fix: Check [actuators] in the config."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for configuration, 4 for payloads, 1 for the rest.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CourseError>() {
        return match ce {
            CourseError::Config(_) => EXIT_CONFIG,
            CourseError::Payload(_) => EXIT_PAYLOAD,
            _ => EXIT_GENERIC,
        };
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return EXIT_CONFIG;
    }
    EXIT_GENERIC
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(ce) = err.downcast_ref::<CourseError>() {
        return match ce {
            CourseError::Config(_) => "ConfigInvalid",
            CourseError::Payload(_) => "PayloadInvalid",
            CourseError::Storage(_) => "Storage",
            CourseError::Hardware(_) => "Hardware",
        };
    }
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "ConfigInvalid",
            _ => "Build",
        };
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_map_to_exit_four() {
        let err = eyre::Report::new(CourseError::Payload("too short".into()));
        assert_eq!(exit_code_for_error(&err), EXIT_PAYLOAD);
        assert!(humanize(&err).contains("46 bytes"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "PayloadInvalid");
    }

    #[rstest::rstest]
    #[case(CourseError::Hardware("nack".into()), "Hardware", EXIT_GENERIC)]
    #[case(CourseError::Storage("eio".into()), "Storage", EXIT_GENERIC)]
    #[case(CourseError::Config("bad".into()), "ConfigInvalid", EXIT_CONFIG)]
    #[case(CourseError::Payload("short".into()), "PayloadInvalid", EXIT_PAYLOAD)]
    fn every_course_error_has_a_reason(
        #[case] e: CourseError,
        #[case] reason: &str,
        #[case] code: i32,
    ) {
        let err = eyre::Report::new(e);
        assert_eq!(reason_name(&err), reason);
        assert_eq!(exit_code_for_error(&err), code);
        assert!(humanize(&err).starts_with("What happened"));
    }

    #[test]
    fn invalid_build_config_is_a_config_error() {
        let err = eyre::Report::new(BuildError::InvalidConfig("bad groups".into()));
        assert_eq!(exit_code_for_error(&err), EXIT_CONFIG);
    }

    #[test]
    fn unknown_errors_fall_back() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), EXIT_GENERIC);
        assert!(humanize(&err).contains("Original: boom"));
    }
}
