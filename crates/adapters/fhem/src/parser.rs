//! Parsers for controller output.
//!
//! Pure functions over single lines — no IO.

use std::sync::LazyLock;

use regex::Regex;

use washhub_domain::power::PowerSample;

static POWER_EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(\S+)\spower:\s(\d+(?:\.\d+)?)").expect("power event regex must compile")
});

/// Extract a power reading from an event line such as
/// `2024-01-01 12:00:00 CUL_HM wm1_power power: 451.3`.
///
/// Returns `None` for any other event.
#[must_use]
pub fn parse_power_event(line: &str) -> Option<PowerSample> {
    let captures = POWER_EVENT_RE.captures(line)?;
    let watts = captures[2].parse().ok()?;
    Some(PowerSample {
        power_name: captures[1].to_string(),
        watts,
    })
}

/// The handshake answer identifies an FHEM server.
#[must_use]
pub fn is_fhem_version(response: &str) -> bool {
    response.contains("fhem.pl")
}
