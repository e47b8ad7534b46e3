use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analyzer::AnalysisError;

/// Estimated visitor attributes, as produced by the image analyzer.
///
/// All four fields are free-form text. Values are never edited in place:
/// corrections build a new `Profile` via [`Profile::with_field`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Plausible name or descriptive title ("Professional Man in his 40s").
    pub name: String,
    /// Age range such as "25-30".
    pub age: String,
    pub gender: String,
    pub profession: String,
}

/// One editable field of a [`Profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Age,
    Gender,
    Profession,
}

impl ProfileField {
    pub const ALL: [ProfileField; 4] = [
        ProfileField::Name,
        ProfileField::Age,
        ProfileField::Gender,
        ProfileField::Profession,
    ];

    /// JSON key used by the analyzer response schema.
    pub fn key(self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Age => "age",
            ProfileField::Gender => "gender",
            ProfileField::Profession => "profession",
        }
    }
}

/// Analyzer output before required-field validation.
#[derive(Deserialize)]
struct ProfileResponse {
    name: Option<String>,
    age: Option<String>,
    gender: Option<String>,
    profession: Option<String>,
}

impl Profile {
    /// Parse an analyzer JSON response into a profile.
    ///
    /// Every field must be present and non-blank.
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        let raw: ProfileResponse = serde_json::from_str(text.trim())
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        fn required(value: Option<String>, field: ProfileField) -> Result<String, AnalysisError> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(AnalysisError::MissingField(field.key())),
            }
        }

        Ok(Self {
            name: required(raw.name, ProfileField::Name)?,
            age: required(raw.age, ProfileField::Age)?,
            gender: required(raw.gender, ProfileField::Gender)?,
            profession: required(raw.profession, ProfileField::Profession)?,
        })
    }

    pub fn field(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::Age => &self.age,
            ProfileField::Gender => &self.gender,
            ProfileField::Profession => &self.profession,
        }
    }

    /// Copy of this profile with one field overwritten.
    pub fn with_field(&self, field: ProfileField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let slot = match field {
            ProfileField::Name => &mut next.name,
            ProfileField::Age => &mut next.age,
            ProfileField::Gender => &mut next.gender,
            ProfileField::Profession => &mut next.profession,
        };
        *slot = value.into();
        next
    }

    /// Every field must hold something other than whitespace.
    pub fn validate(&self) -> Result<(), BlankField> {
        match ProfileField::ALL
            .into_iter()
            .find(|&f| self.field(f).trim().is_empty())
        {
            Some(field) => Err(BlankField(field)),
            None => Ok(()),
        }
    }
}

/// A profile field was left empty.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("profile field `{}` must not be blank", .0.key())]
pub struct BlankField(pub ProfileField);

/// Check-in status. Only ever moves `CheckedIn -> CheckedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitorStatus {
    #[serde(rename = "Checked-in")]
    CheckedIn,
    #[serde(rename = "Checked-out")]
    CheckedOut,
}

impl std::fmt::Display for VisitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VisitorStatus::CheckedIn => "Checked-in",
            VisitorStatus::CheckedOut => "Checked-out",
        })
    }
}

/// One check-in event.
///
/// Status is derived from the check-out instant, so a checked-out record
/// always carries its check-out time and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredRecord", try_from = "StoredRecord")]
pub struct VisitorRecord {
    id: Uuid,
    timestamp: DateTime<Utc>,
    check_out_time: Option<DateTime<Utc>>,
    photo: String,
    raw_profile: Profile,
    pub(crate) enhanced_profile: Profile,
}

impl VisitorRecord {
    /// Create a fresh check-in with a newly generated id.
    pub fn check_in(
        photo: String,
        raw_profile: Profile,
        enhanced_profile: Profile,
        at: DateTime<Utc>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), photo, raw_profile, enhanced_profile, at)
    }

    /// Create a check-in under a caller-supplied id.
    pub fn with_id(
        id: Uuid,
        photo: String,
        raw_profile: Profile,
        enhanced_profile: Profile,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            timestamp: at,
            check_out_time: None,
            photo,
            raw_profile,
            enhanced_profile,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Check-in instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn check_out_time(&self) -> Option<DateTime<Utc>> {
        self.check_out_time
    }

    pub fn status(&self) -> VisitorStatus {
        if self.check_out_time.is_some() {
            VisitorStatus::CheckedOut
        } else {
            VisitorStatus::CheckedIn
        }
    }

    /// Photo as captured, usually a `data:` URL.
    pub fn photo(&self) -> &str {
        &self.photo
    }

    /// Analyzer output at scan time. Never changes.
    pub fn raw_profile(&self) -> &Profile {
        &self.raw_profile
    }

    /// Operator-reviewed profile used for display, filtering and export.
    pub fn enhanced_profile(&self) -> &Profile {
        &self.enhanced_profile
    }

    /// Record a check-out. Returns false if already checked out.
    pub(crate) fn mark_checked_out(&mut self, at: DateTime<Utc>) -> bool {
        if self.check_out_time.is_some() {
            return false;
        }
        self.check_out_time = Some(at);
        true
    }
}

/// On-disk layout: camelCase keys with an explicit status string.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: Uuid,
    timestamp: DateTime<Utc>,
    check_out_time: Option<DateTime<Utc>>,
    status: VisitorStatus,
    photo: String,
    raw_profile: Profile,
    enhanced_profile: Profile,
}

impl From<VisitorRecord> for StoredRecord {
    fn from(r: VisitorRecord) -> Self {
        let status = r.status();
        Self {
            id: r.id,
            timestamp: r.timestamp,
            check_out_time: r.check_out_time,
            status,
            photo: r.photo,
            raw_profile: r.raw_profile,
            enhanced_profile: r.enhanced_profile,
        }
    }
}

impl TryFrom<StoredRecord> for VisitorRecord {
    type Error = String;

    fn try_from(s: StoredRecord) -> Result<Self, Self::Error> {
        match (s.status, s.check_out_time) {
            (VisitorStatus::CheckedIn, Some(_)) => {
                return Err(format!("record {} is checked in but has a check-out time", s.id));
            }
            (VisitorStatus::CheckedOut, None) => {
                return Err(format!("record {} is checked out without a check-out time", s.id));
            }
            _ => {}
        }
        Ok(Self {
            id: s.id,
            timestamp: s.timestamp,
            check_out_time: s.check_out_time,
            photo: s.photo,
            raw_profile: s.raw_profile,
            enhanced_profile: s.enhanced_profile,
        })
    }
}

/// Accepted photo formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
    Webp,
}

impl ImageMime {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
            ImageMime::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            "image/webp" => Some(ImageMime::Webp),
            _ => None,
        }
    }
}

/// An image ready for analysis: a displayable preview plus the JPEG payload
/// sent to the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// `data:<mime>;base64,...` URL of the original image.
    pub preview: String,
    /// Base64-encoded JPEG bytes.
    pub jpeg_base64: String,
    /// Format of the original image.
    pub mime: ImageMime,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_profile_from_json_complete() {
        let p = Profile::from_json(
            r#"{"name":"Alice","age":"25-30","gender":"Female","profession":"Doctor"}"#,
        )
        .unwrap();
        assert_eq!(p.name, "Alice");
        assert_eq!(p.profession, "Doctor");
    }

    #[test]
    fn test_profile_from_json_missing_gender() {
        let err = Profile::from_json(r#"{"name":"Alice","age":"25-30","profession":"Doctor"}"#)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingField("gender")));
    }

    #[test]
    fn test_profile_from_json_blank_field() {
        let err = Profile::from_json(
            r#"{"name":"  ","age":"25-30","gender":"Male","profession":"Doctor"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingField("name")));
    }

    #[test]
    fn test_profile_from_json_not_json() {
        let err = Profile::from_json("I see a person").unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));
    }

    #[test]
    fn test_with_field_leaves_original_untouched() {
        let p = profile("Alice");
        let q = p.with_field(ProfileField::Profession, "Architect");
        assert_eq!(p.profession, "Engineer");
        assert_eq!(q.profession, "Architect");
        assert_eq!(q.field(ProfileField::Name), "Alice");
    }

    #[test]
    fn test_new_record_is_checked_in() {
        let r = record("Alice", "2024-06-10T09:00:00Z");
        assert_eq!(r.status(), VisitorStatus::CheckedIn);
        assert!(r.check_out_time().is_none());
    }

    #[test]
    fn test_check_out_sets_time_once() {
        let mut r = record("Alice", "2024-06-10T09:00:00Z");
        assert!(r.mark_checked_out(at("2024-06-10T10:00:00Z")));
        assert!(!r.mark_checked_out(at("2024-06-10T11:00:00Z")));
        assert_eq!(r.status(), VisitorStatus::CheckedOut);
        assert_eq!(r.check_out_time(), Some(at("2024-06-10T10:00:00Z")));
    }

    #[test]
    fn test_record_serializes_in_stored_layout() {
        let mut r = record("Alice", "2024-06-10T09:00:00Z");
        r.mark_checked_out(at("2024-06-10T10:00:00Z"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "Checked-out");
        assert!(json["checkOutTime"].is_string());
        assert_eq!(json["rawProfile"]["name"], "Alice");
        assert_eq!(json["enhancedProfile"]["age"], "30-35");
    }

    #[test]
    fn test_record_decodes_browser_log_entry() {
        let json = r#"{
            "id": "3f1c2a4e-8d6b-4c1f-9a7e-2b5d6e7f8a90",
            "timestamp": "2024-06-10T09:15:30.123Z",
            "checkOutTime": null,
            "status": "Checked-in",
            "photo": "data:image/jpeg;base64,AAAA",
            "rawProfile": {"name":"A","age":"20-25","gender":"Male","profession":"Student"},
            "enhancedProfile": {"name":"Bob","age":"20-25","gender":"Male","profession":"Student"}
        }"#;
        let r: VisitorRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.status(), VisitorStatus::CheckedIn);
        assert_eq!(r.enhanced_profile().name, "Bob");
        assert_eq!(r.raw_profile().name, "A");
    }

    #[test]
    fn test_record_rejects_inconsistent_status() {
        let json = r#"{
            "id": "3f1c2a4e-8d6b-4c1f-9a7e-2b5d6e7f8a90",
            "timestamp": "2024-06-10T09:15:30Z",
            "checkOutTime": null,
            "status": "Checked-out",
            "photo": "",
            "rawProfile": {"name":"A","age":"1","gender":"M","profession":"P"},
            "enhancedProfile": {"name":"A","age":"1","gender":"M","profession":"P"}
        }"#;
        assert!(serde_json::from_str::<VisitorRecord>(json).is_err());
    }

    #[test]
    fn test_image_mime_from_mime() {
        assert_eq!(ImageMime::from_mime("image/jpeg"), Some(ImageMime::Jpeg));
        assert_eq!(ImageMime::from_mime("IMAGE/PNG"), Some(ImageMime::Png));
        assert_eq!(ImageMime::from_mime("image/webp"), Some(ImageMime::Webp));
        assert_eq!(ImageMime::from_mime("image/gif"), None);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert_eq!(profile("Alice").validate(), Ok(()));
        assert_eq!(
            profile("Alice").with_field(ProfileField::Name, "").validate(),
            Err(BlankField(ProfileField::Name))
        );
        assert_eq!(
            profile("Alice").with_field(ProfileField::Profession, "  ").validate(),
            Err(BlankField(ProfileField::Profession))
        );
        assert_eq!(
            BlankField(ProfileField::Age).to_string(),
            "profile field `age` must not be blank"
        );
    }
}
