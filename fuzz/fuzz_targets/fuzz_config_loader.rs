#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = putt_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A valid config must convert and yield a buildable rollout plan.
            let core = putt_core::CoreConfig::from(&cfg);
            let addresses: Vec<u8> = core.actuators.chips.iter().map(|c| c.address).collect();
            let plan = putt_core::RolloutPlan::new(
                putt_core::NUM_ACTUATORS,
                core.actuators.rollout_groups,
                core.actuators.channels_per_chip,
                &addresses,
            );
            assert!(plan.is_ok(), "validated config rejected by rollout plan: {plan:?}");
        }
    }
});
