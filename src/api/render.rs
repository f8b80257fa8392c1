//! Plain-text bodies for /log, /info and the usage page.

use crate::codec;
use crate::house::HouseId;
use crate::state::Event;
use chrono::{DateTime, Duration};
use chrono_humanize::HumanTime;

/// Footer shown on / and /info
const SOURCE_LINKS: &str = "Server Source code: https://github.com/solarkennedy/ether_housed \n\
                            Client code: https://github.com/solarkennedy/ether_house \n";

/// Unix seconds as `YYYY-MM-DD HH:MM:SS +0000 UTC`
pub fn format_timestamp(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S %z UTC").to_string(),
        None => timestamp.to_string(),
    }
}

/// Coarse relative time, e.g. `2 minutes ago` or `in 2 hours`
pub fn humanize_since(timestamp: i64, now: i64) -> String {
    match Duration::try_seconds(timestamp.saturating_sub(now)) {
        Some(delta) => HumanTime::from(delta).to_string(),
        None => format_timestamp(timestamp),
    }
}

/// One `timestamp: House N: message` line per event
pub fn render_log(events: &[Event]) -> String {
    events
        .iter()
        .map(|event| {
            format!(
                "{}: House {}: {}\n",
                format_timestamp(event.timestamp),
                event.house,
                event.message
            )
        })
        .collect()
}

/// One line per house: `House N: Never` or the time it last checked in
pub fn render_last_seen(last_seen: &[i64], now: i64) -> String {
    last_seen
        .iter()
        .enumerate()
        .map(|(house, &ts)| match ts {
            0 => format!("House {}: Never\n", house),
            ts => format!(
                "House {}: {} ({})\n",
                house,
                format_timestamp(ts),
                humanize_since(ts, now)
            ),
        })
        .collect()
}

/// Everything shown on /info for one house
pub struct InfoPage<'a> {
    pub house: HouseId,
    pub state_bits: u64,
    pub target_mac: &'a str,
    pub last_seen: &'a [i64],
    pub events: &'a [Event],
    pub now: i64,
}

impl InfoPage<'_> {
    pub fn render(&self) -> String {
        let mut logs = render_log(self.events);
        if logs.is_empty() {
            logs.push_str("(None yet)\n");
        }

        [
            "Hi!!! Curious about how this works? Here is some debug info.\n\n\n".to_string(),
            format!("Information on house_id: {}\n", self.house),
            format!(
                "Current state: {} ({})\n",
                codec::format_bits(self.state_bits),
                self.state_bits
            ),
            format!("Target MAC Address: {}\n\n\n", self.target_mac),
            format!(
                "Last seen: \n{}\n\n",
                render_last_seen(self.last_seen, self.now)
            ),
            format!("Logs for this house:\n{}\n\n", logs),
            SOURCE_LINKS.to_string(),
        ]
        .concat()
    }
}

/// Body served at `/`
pub fn usage() -> String {
    let endpoints: String = [
        ("/state", "current state of all houses, one bit per house"),
        ("/on", "turn your house on"),
        ("/off", "turn your house off"),
        ("/target_mac", "6-byte MAC address your house should watch for"),
        ("/log", "recent actions for your house"),
        ("/info", "human readable debug info"),
    ]
    .iter()
    .map(|(path, what)| format!("  {:<12} {}\n", path, what))
    .collect();

    format!(
        "Welcome to housed.\n\n\
         Every endpoint takes ?id=<house>&api_key=<key>\n\
         {}\n{}",
        endpoints, SOURCE_LINKS
    )
}
