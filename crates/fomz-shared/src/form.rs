//! Form, draft and question model.
//!
//! Field names serialize in camelCase so stored JSON matches what the
//! builder UI reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_THEME;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// How a single-answer choice question is rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChoiceDisplay {
    #[default]
    Radio,
    Dropdown,
}

/// Kind-specific part of a question. Each variant carries only the fields
/// relevant to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    Choice {
        options: Vec<String>,
        #[serde(default)]
        display: ChoiceDisplay,
    },
    Checkbox {
        options: Vec<String>,
    },
    Rating {
        #[serde(default = "default_rating_max")]
        max: u8,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Date,
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    SectionBreak,
}

fn default_rating_max() -> u8 {
    5
}

impl QuestionKind {
    /// Short label used in analytics output and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ShortText => "short-text",
            Self::LongText => "long-text",
            Self::Choice {
                display: ChoiceDisplay::Radio,
                ..
            } => "multiple-choice",
            Self::Choice {
                display: ChoiceDisplay::Dropdown,
                ..
            } => "dropdown",
            Self::Checkbox { .. } => "checkbox",
            Self::Rating { .. } => "rating",
            Self::Number { .. } => "number",
            Self::Date => "date",
            Self::Image { .. } => "image",
            Self::SectionBreak => "section-break",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            required: false,
            section_id: None,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Presentation and settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormStyle {
    pub font_family: String,
    pub font_size: String,
    pub corner_radius: String,
}

impl Default for FormStyle {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: "medium".to_string(),
            corner_radius: "medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSettings {
    pub published: bool,
    pub allow_multiple_submissions: bool,
    pub require_login: bool,
    pub send_email_receipt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub show_progress_bar: bool,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            published: false,
            allow_multiple_submissions: true,
            require_login: false,
            send_email_receipt: false,
            redirect_url: None,
            show_progress_bar: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Everything the builder edits. Shared by drafts and forms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub style: FormStyle,
    #[serde(default)]
    pub settings: FormSettings,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Default for FormContent {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            sections: Vec::new(),
            questions: Vec::new(),
            theme: default_theme(),
            style: FormStyle::default(),
            settings: FormSettings::default(),
        }
    }
}

impl FormContent {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Blank title, blank description and no questions. Such content is
    /// never persisted as a draft.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.description.trim().is_empty()
            && self.questions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Bookkeeping written onto a local form once it has a cloud counterpart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationMarker {
    pub cloud_form_id: String,
    #[serde(default)]
    pub migrated_response_ids: Vec<String>,
    pub migrated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(flatten)]
    pub content: FormContent,
    #[serde(default)]
    pub is_local: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationMarker>,
}

impl Form {
    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn is_published(&self) -> bool {
        self.content.settings.published
    }
}

/// Partial update merged into a stored form. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<FormStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<FormSettings>,
}

impl FormPatch {
    /// A patch that replaces every content field with `content`.
    pub fn from_content(content: &FormContent) -> Self {
        Self {
            title: Some(content.title.clone()),
            description: Some(content.description.clone()),
            sections: Some(content.sections.clone()),
            questions: Some(content.questions.clone()),
            theme: Some(content.theme.clone()),
            style: Some(content.style.clone()),
            settings: Some(content.settings.clone()),
        }
    }

    pub fn apply(self, content: &mut FormContent) {
        if let Some(title) = self.title {
            content.title = title;
        }
        if let Some(description) = self.description {
            content.description = description;
        }
        if let Some(sections) = self.sections {
            content.sections = sections;
        }
        if let Some(questions) = self.questions {
            content.questions = questions;
        }
        if let Some(theme) = self.theme {
            content.theme = theme;
        }
        if let Some(style) = self.style {
            content.style = style;
        }
        if let Some(settings) = self.settings {
            content.settings = settings;
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A pre-publish snapshot of builder content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(flatten)]
    pub content: FormContent,
    pub updated_at: DateTime<Utc>,
}
