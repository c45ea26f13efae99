//! Configuration snapshot.
//!
//! The host hands over its preference JSON (`{ "hz": .., "keys": .., "sieve": .. }`)
//! and gets back an immutable [`Config`]. Every knob has a default, so partial
//! documents are fine. Updates replace the whole snapshot.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hz: Behavior,
    pub keys: KeyBindings,
    /// Raw sieve rules in declaration order. Compiled by [`crate::RuleSet::compile`].
    pub sieve: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Config::from_json_str(&text)
    }

    /// Checks knob combinations that cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hz.trigger_mode() == TriggerMode::HoldToShow && self.hz.act_trigger == Trigger::None {
            return Err(ConfigError::ConflictingTrigger);
        }
        Ok(())
    }
}

/// Which modifier (or mouse button) drives the freeze gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    #[serde(rename = "0")]
    None,
    #[default]
    #[serde(rename = "ctrl")]
    Ctrl,
    #[serde(rename = "shift")]
    Shift,
    #[serde(rename = "alt")]
    Alt,
    #[serde(rename = "meta")]
    Meta,
    /// Right mouse button.
    #[serde(rename = "m2")]
    RightButton,
}

impl Trigger {
    /// Key name reported by [`crate::presentation::Key`] for modifier triggers.
    pub fn key_name(self) -> Option<&'static str> {
        match self {
            Trigger::Ctrl => Some("ctrl"),
            Trigger::Shift => Some("shift"),
            Trigger::Alt => Some("alt"),
            Trigger::Meta => Some("meta"),
            Trigger::None | Trigger::RightButton => None,
        }
    }
}

/// How the trigger interacts with hovering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Previews appear only while the trigger is held.
    HoldToShow,
    /// Previews appear on plain hover; holding the trigger suppresses them.
    HoldToSuppress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimDurations {
    pub opacity: u64,
    pub position: u64,
    pub size: u64,
}

impl AnimDurations {
    /// Longest configured transition; the hide animation waits this long.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.opacity.max(self.position).max(self.size))
    }
}

/// The `hz` block: hover behaviour knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Behavior {
    /// Hover delay in ms before a preview starts loading.
    pub delay: u64,
    pub wait_hide: bool,
    pub delay_on_idle: bool,
    /// `false`: hold the trigger to show. `true`: hold the trigger to suppress.
    pub deactivate: bool,
    pub act_trigger: Trigger,
    /// 0 off, 1 neighbours only, 2 also fresh resolves, 3 three album neighbours.
    pub preload: u8,
    pub pile_cycle: bool,
    /// 0 off, 1 vertical wheel, 2 horizontal wheel.
    pub pile_wheel: u8,
    /// Minimum percentage by which natural size must exceed displayed size.
    pub zoomresized: u32,
    pub history: bool,
    pub hi_res: bool,
    /// 0 off, otherwise the minimum aspect ratio that triggers hi-res on full zoom.
    #[serde(rename = "hiResOnFZ")]
    pub hi_res_on_fz: f64,
    /// 1 starts full zoom fitted, anything else panned.
    pub fz_mode: u8,
    /// 0 off, 1 short right press, 2 long right press.
    pub fz_on_press: u8,
    pub cap_text: bool,
    pub cap_link_text: bool,
    /// Append natural dimensions to the caption.
    #[serde(rename = "capWH")]
    pub cap_wh: bool,
    #[serde(rename = "LDRdelay")]
    pub ldr_delay: u64,
    pub hide_idle_cursor: u64,
    pub cap_flash_count: u32,
    pub scroll_delay: u64,
    /// Reposition the popup while the pointer moves over the target.
    #[serde(rename = "move")]
    pub follow_pointer: bool,
    pub min_popup_distance: f64,
    pub anim: AnimDurations,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            delay: 100,
            wait_hide: false,
            delay_on_idle: false,
            deactivate: true,
            act_trigger: Trigger::Ctrl,
            preload: 2,
            pile_cycle: true,
            pile_wheel: 1,
            zoomresized: 25,
            history: false,
            hi_res: false,
            hi_res_on_fz: 0.0,
            fz_mode: 0,
            fz_on_press: 0,
            cap_text: true,
            cap_link_text: false,
            cap_wh: false,
            ldr_delay: 300,
            hide_idle_cursor: 0,
            cap_flash_count: 0,
            scroll_delay: 200,
            follow_pointer: false,
            min_popup_distance: 4.0,
            anim: AnimDurations::default(),
        }
    }
}

impl Behavior {
    pub fn trigger_mode(&self) -> TriggerMode {
        if self.deactivate { TriggerMode::HoldToSuppress } else { TriggerMode::HoldToShow }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

/// The `keys` block. Values are key names as produced by [`crate::presentation::Key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    #[serde(rename = "hz_fullZm")]
    pub full_zoom: String,
    #[serde(rename = "hz_save")]
    pub save: String,
    #[serde(rename = "hz_open")]
    pub open: String,
    #[serde(rename = "hz_history")]
    pub history: String,
    #[serde(rename = "hz_caption")]
    pub caption: String,
    #[serde(rename = "hz_toggle")]
    pub toggle: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            full_zoom: "Z".to_string(),
            save: "S".to_string(),
            open: "O".to_string(),
            history: "H".to_string(),
            caption: "C".to_string(),
            toggle: "T".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(Behavior::default(), config.hz);
        assert!(config.sieve.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_camel_case_knobs_and_keeps_rule_order() {
        let json = r#"{
            "hz": { "delay": 250, "waitHide": true, "LDRdelay": 40, "actTrigger": "shift",
                    "anim": { "opacity": 120, "size": 300 } },
            "keys": { "hz_fullZm": "F" },
            "sieve": { "zeta": { "link": "z" }, "alpha": { "link": "a" } }
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(250, config.hz.delay);
        assert!(config.hz.wait_hide);
        assert_eq!(40, config.hz.ldr_delay);
        assert_eq!(Trigger::Shift, config.hz.act_trigger);
        assert_eq!(Duration::from_millis(300), config.hz.anim.max_delay());
        assert_eq!("F", config.keys.full_zoom);
        assert_eq!("S", config.keys.save);
        let names: Vec<&str> = config.sieve.keys().map(String::as_str).collect();
        assert_eq!(vec!["zeta", "alpha"], names);
    }

    #[test]
    fn hold_to_show_without_trigger_conflicts() {
        let config = Config::from_json_str(r#"{ "hz": { "deactivate": false, "actTrigger": "0" } }"#).unwrap();
        assert_eq!(TriggerMode::HoldToShow, config.hz.trigger_mode());
        assert!(matches!(config.validate(), Err(ConfigError::ConflictingTrigger)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Config::from_json_str("{ hz: }"), Err(ConfigError::Json(_))));
    }
}
