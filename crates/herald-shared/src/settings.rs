//! Per-user delivery preferences.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownSetting;

/// Delivery flags applied to every post a user sends. All default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Deliver without a notification sound.
    pub quiet: bool,
    /// Forbid forwarding and saving of delivered messages.
    pub protect_content: bool,
    /// Blur media behind a spoiler overlay where supported.
    pub spoiler: bool,
    pub disable_link_preview: bool,
    pub caption_above: bool,
    /// Forward the authored message instead of re-sending a copy.
    pub forward_tag: bool,
}

impl UserSettings {
    pub fn get(&self, field: SettingField) -> bool {
        match field {
            SettingField::Quiet => self.quiet,
            SettingField::ProtectContent => self.protect_content,
            SettingField::Spoiler => self.spoiler,
            SettingField::DisableLinkPreview => self.disable_link_preview,
            SettingField::CaptionAbove => self.caption_above,
            SettingField::ForwardTag => self.forward_tag,
        }
    }

    pub fn set(&mut self, field: SettingField, value: bool) {
        let slot = match field {
            SettingField::Quiet => &mut self.quiet,
            SettingField::ProtectContent => &mut self.protect_content,
            SettingField::Spoiler => &mut self.spoiler,
            SettingField::DisableLinkPreview => &mut self.disable_link_preview,
            SettingField::CaptionAbove => &mut self.caption_above,
            SettingField::ForwardTag => &mut self.forward_tag,
        };
        *slot = value;
    }
}

/// One toggleable field of [`UserSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    Quiet,
    ProtectContent,
    Spoiler,
    DisableLinkPreview,
    CaptionAbove,
    ForwardTag,
}

impl SettingField {
    pub const ALL: [SettingField; 6] = [
        Self::Quiet,
        Self::ProtectContent,
        Self::Spoiler,
        Self::DisableLinkPreview,
        Self::CaptionAbove,
        Self::ForwardTag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::ProtectContent => "protect_content",
            Self::Spoiler => "spoiler",
            Self::DisableLinkPreview => "disable_link_preview",
            Self::CaptionAbove => "caption_above",
            Self::ForwardTag => "forward_tag",
        }
    }
}

impl FromStr for SettingField {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownSetting(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_all_off() {
        let settings = UserSettings::default();
        for field in SettingField::ALL {
            assert!(!settings.get(field), "{} should default to off", field.name());
        }
    }

    #[test]
    fn test_set_touches_only_one_field() {
        let mut settings = UserSettings::default();
        settings.set(SettingField::Spoiler, true);
        assert!(settings.spoiler);
        assert!(!settings.quiet);
        assert!(!settings.forward_tag);
    }

    #[test]
    fn test_parse_field_names() {
        assert_eq!("caption_above".parse::<SettingField>(), Ok(SettingField::CaptionAbove));
        assert!("webpreview".parse::<SettingField>().is_err());
    }
}
