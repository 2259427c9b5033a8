#![no_main]
use libfuzzer_sys::fuzz_target;
use putt_core::Command;
use putt_core::payload::{
    COURSE_STATE_LEN, decode_course_state, decode_dispense, decode_settings, encode_course_state,
};

fuzz_target!(|data: &[u8]| {
    let _ = decode_dispense(data);
    let _ = decode_settings(data);
    if let Ok(Command::SetCourse { mode, positions }) = decode_course_state(data) {
        assert_eq!(data.len(), COURSE_STATE_LEN);
        assert_eq!(&encode_course_state(mode, &positions)[..], data);
    }
});
