//! Best-effort master-directory announcement.
//!
//! A background thread POSTs the server listing at a fixed interval. It
//! only reads aggregate counters from the shared registry and tolerates
//! stale values; failures are logged and never escalated, and nothing
//! retries faster than the interval.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use freeroam::{SessionRegistry, compatible_version_display};

use crate::config::Settings;

const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(12_500);

/// Listing body the master directory expects; every value is a string on
/// the wire.
#[derive(Debug, Serialize)]
struct Announcement {
    port: String,
    name: String,
    version: String,
    players: String,
    #[serde(rename = "maxPlayers")]
    max_players: String,
    allowlist: String,
    mods: String,
    npcs: String,
    country: String,
}

impl Announcement {
    fn build(settings: &Settings, players: usize, country: &str) -> Self {
        Self {
            port: settings.port.to_string(),
            name: settings.server_name.clone(),
            version: compatible_version_display(),
            players: players.to_string(),
            max_players: settings.max_players.to_string(),
            allowlist: settings.allowlist.to_string(),
            mods: settings.mods_allowed.to_string(),
            npcs: settings.npcs_allowed.to_string(),
            country: country.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpInfo {
    #[serde(default)]
    country: String,
}

fn lookup_country() -> String {
    let country = ureq::get("https://ipinfo.io/json")
        .call()
        .ok()
        .and_then(|response| response.into_json::<IpInfo>().ok())
        .map(|info| info.country)
        .unwrap_or_default();

    if country.is_empty() {
        "?".to_string()
    } else {
        country
    }
}

pub fn spawn(settings: Settings, registry: Arc<SessionRegistry>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let country = lookup_country();
        log::info!(
            "announcing \"{}\" to {}",
            settings.server_name,
            settings.master_server
        );

        loop {
            let announcement = Announcement::build(&settings, registry.len(), &country);

            match ureq::post(&settings.master_server).send_json(&announcement) {
                Ok(response) => match response.into_string() {
                    Ok(body) if body == "OK" => {}
                    Ok(body) => {
                        // The directory rejected us; repeating the same
                        // listing will not change its mind.
                        log::error!("master server rejected announcement: {body}");
                        return;
                    }
                    Err(e) => log::error!("master server response unreadable: {e}"),
                },
                Err(e) => log::error!("master server announcement failed: {e}"),
            }

            thread::sleep(ANNOUNCE_INTERVAL);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_serializes_every_field_as_a_string() {
        let mut settings = Settings::default();
        settings.server_name = "Test box".to_string();
        settings.port = 4499;
        settings.npcs_allowed = true;

        let json =
            serde_json::to_value(Announcement::build(&settings, 7, "DE")).unwrap();

        assert_eq!(json["port"], "4499");
        assert_eq!(json["name"], "Test box");
        assert_eq!(json["players"], "7");
        assert_eq!(json["maxPlayers"], "32");
        assert_eq!(json["npcs"], "true");
        assert_eq!(json["country"], "DE");
        assert_eq!(json["version"], compatible_version_display());
    }
}
