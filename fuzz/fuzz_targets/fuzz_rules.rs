// Fuzz target feeding arbitrary rule documents through the parser and engine.
#![no_main]

use chrono::NaiveDate;
use fortune_rules::{parse_rules, validate_rules, Identity, RuleEngine, UserContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(rules) = parse_rules(text, "fuzz") else {
        return;
    };

    let _ = validate_rules(&rules);

    let Some(time) = NaiveDate::from_ymd_opt(2024, 5, 12).and_then(|date| date.and_hms_opt(8, 0, 0))
    else {
        return;
    };
    let ctx = UserContext::at(time)
        .with_weather("Rainy")
        .with_location("New York")
        .with_scan_count(5);
    let engine = RuleEngine::new(rules);
    let _ = engine.personalize("Find your calm today.", &ctx, &Identity::named("Alice"));
    let _ = engine.message_set_hint(&ctx);
});
