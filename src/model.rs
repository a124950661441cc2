//! Data models for SafeReport.
//!
//! # Privacy
//!
//! A [`ReportDraft`] holds a survivor's account of an incident. Nothing in
//! this module implements `Display` for the draft, and the rest of the crate
//! only ever logs the category, attachment size, and rounded coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed incident categories offered by the report form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Sexual Harassment")]
    SexualHarassment,
    #[serde(rename = "Sexual Assault")]
    SexualAssault,
    #[serde(rename = "Domestic Violence")]
    DomesticViolence,
    #[serde(rename = "Stalking")]
    Stalking,
    #[serde(rename = "Verbal Abuse")]
    VerbalAbuse,
    #[serde(rename = "Emotional Abuse")]
    EmotionalAbuse,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    /// All categories in the order the form lists them.
    pub const ALL: [Category; 7] = [
        Category::SexualHarassment,
        Category::SexualAssault,
        Category::DomesticViolence,
        Category::Stalking,
        Category::VerbalAbuse,
        Category::EmotionalAbuse,
        Category::Other,
    ];

    /// The label shown to the user, which is also the wire value.
    pub fn label(&self) -> &'static str {
        match self {
            Category::SexualHarassment => "Sexual Harassment",
            Category::SexualAssault => "Sexual Assault",
            Category::DomesticViolence => "Domestic Violence",
            Category::Stalking => "Stalking",
            Category::VerbalAbuse => "Verbal Abuse",
            Category::EmotionalAbuse => "Emotional Abuse",
            Category::Other => "Other",
        }
    }

    /// Parse a category label, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Gender of the affected person. Optional on the form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl Gender {
    /// Value sent in the `gender` form field.
    pub fn wire_value(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "other",
            Gender::Unset => "",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "female" => Some(Gender::Female),
            "male" => Some(Gender::Male),
            "other" => Some(Gender::Other),
            "" | "unset" => Some(Gender::Unset),
            _ => None,
        }
    }
}

/// A file selected as evidence, held in memory until the report is submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EvidenceFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// Contents are left out of debug output.
impl fmt::Debug for EvidenceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// The in-progress, unsaved report for the current session.
///
/// `category` keeps the raw selected text so that an unselected category is
/// simply the empty string, exactly as the form presents it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub category: String,
    pub description: String,
    pub gender: Gender,
    pub location: String,
    pub perpetrator_details: String,
    pub anonymous: bool,
    pub contact_phone: String,
    pub contact_email: String,
    pub evidence: Option<EvidenceFile>,
}

/// A single field update coming from the form.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftField {
    Category(String),
    Description(String),
    Gender(Gender),
    Location(String),
    PerpetratorDetails(String),
    Anonymous(bool),
    ContactPhone(String),
    ContactEmail(String),
}

impl ReportDraft {
    /// Return a new draft with one field replaced.
    ///
    /// The receiver is left untouched so observers holding the previous draft
    /// can compare old and new values.
    pub fn with_field(&self, field: DraftField) -> ReportDraft {
        let mut next = self.clone();
        match field {
            DraftField::Category(v) => next.category = v,
            DraftField::Description(v) => next.description = v,
            DraftField::Gender(v) => next.gender = v,
            DraftField::Location(v) => next.location = v,
            DraftField::PerpetratorDetails(v) => next.perpetrator_details = v,
            DraftField::Anonymous(v) => next.anonymous = v,
            DraftField::ContactPhone(v) => next.contact_phone = v,
            DraftField::ContactEmail(v) => next.contact_email = v,
        }
        next
    }

    /// Return a new draft with the given evidence attached (or removed).
    pub fn with_evidence(&self, evidence: Option<EvidenceFile>) -> ReportDraft {
        ReportDraft {
            evidence,
            ..self.clone()
        }
    }

    /// Whether the user supplied at least one way to be contacted.
    pub fn has_contact(&self) -> bool {
        !self.contact_phone.trim().is_empty() || !self.contact_email.trim().is_empty()
    }

    /// The category as a known value, if the selected text is one.
    pub fn known_category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }
}

/// Server response to an accepted submission.
///
/// Any 2xx answer means the report is stored, so a result exists even when
/// the body is empty or carries no identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Identifier assigned by the server, normalised to a string.
    pub id: Option<String>,

    /// The full response body, `Null` if there was none.
    pub body: serde_json::Value,
}

impl SubmissionResult {
    /// Build a result from the body of a 2xx response.
    pub fn from_body(body: serde_json::Value) -> Self {
        let id = match body.get("id") {
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        Self { id, body }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// The two kinds of emergency service the lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Police,
    Hospital,
}

impl ServiceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Police => "Police",
            ServiceKind::Hospital => "Hospital",
        }
    }

    /// Name used when the server does not provide one.
    pub fn fallback_name(&self) -> &'static str {
        match self {
            ServiceKind::Police => "Police Station",
            ServiceKind::Hospital => "Hospital",
        }
    }

    /// Message shown when no service of this kind was found.
    pub fn none_found(&self) -> &'static str {
        match self {
            ServiceKind::Police => "No police stations found nearby",
            ServiceKind::Hospital => "No hospitals found nearby",
        }
    }
}

/// A nearby police station or hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLocation {
    #[serde(default)]
    pub name: String,

    pub lat: f64,

    pub lng: f64,

    /// Distance from the user in metres, when the server computed one.
    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub phone: Option<String>,
}

impl ServiceLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn display_name(&self, kind: ServiceKind) -> &str {
        if self.name.trim().is_empty() {
            kind.fallback_name()
        } else {
            &self.name
        }
    }

    /// Phone number, if a non-empty one was provided.
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Response of the nearest-services endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestServices {
    #[serde(default)]
    pub police: Option<ServiceLocation>,

    #[serde(default)]
    pub hospital: Option<ServiceLocation>,
}

impl NearestServices {
    pub fn get(&self, kind: ServiceKind) -> Option<&ServiceLocation> {
        match kind {
            ServiceKind::Police => self.police.as_ref(),
            ServiceKind::Hospital => self.hospital.as_ref(),
        }
    }
}

/// Format a distance in metres for display.
pub fn format_distance(meters: Option<f64>) -> String {
    match meters {
        Some(m) if m > 0.0 && m < 1000.0 => format!("{} meters", m.round() as i64),
        Some(m) if m >= 1000.0 => format!("{:.1} km", m / 1000.0),
        _ => "N/A".to_string(),
    }
}
