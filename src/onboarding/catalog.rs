//! Step catalog: the fixed, ordered checklist every coach works through.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies one onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKey {
    #[serde(rename = "w9")]
    W9,
    #[serde(rename = "1099")]
    Contract1099,
    #[serde(rename = "headshot")]
    Headshot,
    #[serde(rename = "certifications")]
    Certifications,
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "deck_reviewed")]
    DeckReviewed,
    #[serde(rename = "zoom")]
    Zoom,
    #[serde(rename = "gmail")]
    Gmail,
    #[serde(rename = "salesforce")]
    Salesforce,
    #[serde(rename = "background_check")]
    BackgroundCheck,
}

impl StepKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::W9 => "w9",
            Self::Contract1099 => "1099",
            Self::Headshot => "headshot",
            Self::Certifications => "certifications",
            Self::Profile => "profile",
            Self::DeckReviewed => "deck_reviewed",
            Self::Zoom => "zoom",
            Self::Gmail => "gmail",
            Self::Salesforce => "salesforce",
            Self::BackgroundCheck => "background_check",
        }
    }

    /// Catalog entry for this key.
    pub fn entry(&self) -> &'static CatalogEntry {
        // Every key has exactly one row in ONBOARDING_STEPS.
        ONBOARDING_STEPS
            .iter()
            .find(|e| e.key == *self)
            .unwrap_or(&ONBOARDING_STEPS[0])
    }

    pub fn handling(&self) -> HandlingType {
        self.entry().handling
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ONBOARDING_STEPS
            .iter()
            .map(|e| e.key)
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown step key: {s}"))
    }
}

/// How a step is completed, and by whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlingType {
    /// Coach uploads a document.
    Upload,
    /// Coach fills in the profile form.
    Form,
    /// Coach ticks a confirmation box.
    Checkbox,
    /// Admin marks work done outside the portal.
    Manual,
    /// Admin attaches an unsigned contract; coach uploads the signed copy.
    Contract,
}

impl HandlingType {
    /// Whether submissions of this type go through approve / request-changes.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Upload | Self::Form | Self::Contract)
    }

    /// Whether the coach completes this step from the self-service portal.
    pub fn coach_actionable(&self) -> bool {
        !self.admin_only()
    }

    pub fn admin_only(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl std::fmt::Display for HandlingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upload => "upload",
            Self::Form => "form",
            Self::Checkbox => "checkbox",
            Self::Manual => "manual",
            Self::Contract => "contract",
        };
        write!(f, "{s}")
    }
}

/// Static definition of one checklist item.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub key: StepKey,
    pub label: &'static str,
    pub description: &'static str,
    pub handling: HandlingType,
    /// Shown as optional in the portal. Still counted toward completion.
    pub optional: bool,
}

pub static ONBOARDING_STEPS: &[CatalogEntry] = &[
    CatalogEntry {
        key: StepKey::W9,
        label: "W9 Form",
        description: "Upload your completed W9 form (PDF)",
        handling: HandlingType::Upload,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Contract1099,
        label: "1099 Agreement",
        description: "Download, review, sign, and upload your 1099 contractor agreement",
        handling: HandlingType::Contract,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Headshot,
        label: "Professional Headshot",
        description: "Upload a professional photo for your profile",
        handling: HandlingType::Upload,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Certifications,
        label: "Certifications",
        description: "Upload any relevant certifications (optional, PDF)",
        handling: HandlingType::Upload,
        optional: true,
    },
    CatalogEntry {
        key: StepKey::Profile,
        label: "Coach Profile",
        description: "Complete your coach profile with bio, specialties, and credentials",
        handling: HandlingType::Form,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::DeckReviewed,
        label: "Onboarding Deck Reviewed",
        description: "Confirm you have reviewed the onboarding deck",
        handling: HandlingType::Checkbox,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Zoom,
        label: "Zoom Setup",
        description: "Zoom account configured by admin",
        handling: HandlingType::Manual,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Gmail,
        label: "Gmail Setup",
        description: "Gmail account configured by admin",
        handling: HandlingType::Manual,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::Salesforce,
        label: "Salesforce Portal",
        description: "Salesforce portal access granted by admin",
        handling: HandlingType::Manual,
        optional: false,
    },
    CatalogEntry {
        key: StepKey::BackgroundCheck,
        label: "Background Check",
        description: "Background check completed by admin",
        handling: HandlingType::Manual,
        optional: false,
    },
];

pub fn total_steps() -> usize {
    ONBOARDING_STEPS.len()
}

/// Specialty tags a coach may pick on the profile form.
pub static COACHING_SPECIALTIES: &[&str] = &[
    "Executive Coaching",
    "Career Coaching",
    "Leadership Development",
    "Life Coaching",
    "Health & Wellness",
    "Performance Coaching",
    "Team Coaching",
    "Mindfulness & Stress Management",
    "Communication Skills",
    "Work-Life Balance",
    "Confidence Building",
    "Goal Setting",
    "Transition Coaching",
    "Entrepreneurship",
];

pub fn is_known_specialty(name: &str) -> bool {
    COACHING_SPECIALTIES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_ten_unique_keys() {
        assert_eq!(total_steps(), 10);
        let mut keys: Vec<&str> = ONBOARDING_STEPS.iter().map(|e| e.key.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 10);
    }

    #[test]
    fn catalog_order_is_fixed() {
        let order: Vec<StepKey> = ONBOARDING_STEPS.iter().map(|e| e.key).collect();
        assert_eq!(order[0], StepKey::W9);
        assert_eq!(order[1], StepKey::Contract1099);
        assert_eq!(order[4], StepKey::Profile);
        assert_eq!(order[9], StepKey::BackgroundCheck);
    }

    #[test]
    fn display_matches_serde() {
        for entry in ONBOARDING_STEPS {
            let json = serde_json::to_string(&entry.key).unwrap();
            assert_eq!(json, format!("\"{}\"", entry.key));
            let parsed: StepKey = entry.key.as_str().parse().unwrap();
            assert_eq!(parsed, entry.key);
        }
    }

    #[test]
    fn unknown_key_does_not_parse() {
        assert!("passport".parse::<StepKey>().is_err());
    }

    #[test]
    fn entry_lookup_returns_matching_row() {
        let entry = StepKey::Contract1099.entry();
        assert_eq!(entry.label, "1099 Agreement");
        assert_eq!(entry.handling, HandlingType::Contract);
        assert!(StepKey::Certifications.entry().optional);
    }

    #[test]
    fn reviewable_types() {
        assert!(HandlingType::Upload.is_reviewable());
        assert!(HandlingType::Form.is_reviewable());
        assert!(HandlingType::Contract.is_reviewable());
        assert!(!HandlingType::Checkbox.is_reviewable());
        assert!(!HandlingType::Manual.is_reviewable());
    }

    #[test]
    fn four_manual_steps() {
        let manual = ONBOARDING_STEPS
            .iter()
            .filter(|e| e.handling.admin_only())
            .count();
        assert_eq!(manual, 4);
    }

    #[test]
    fn specialty_lookup() {
        assert!(is_known_specialty("Goal Setting"));
        assert!(!is_known_specialty("goal setting"));
        assert_eq!(COACHING_SPECIALTIES.len(), 14);
    }
}
