//! Payload types for the built-in event kinds.

use beacon_outbox::EventData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialize a payload struct into event data.
pub(crate) fn to_data<T: Serialize>(value: &T) -> EventData {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => EventData::new(),
    }
}

/// Where the host currently is. Stamped on every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Identity stored across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Host-defined attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserInfo {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Overlay `update`: its set fields and extra keys win.
    pub fn merge(mut self, update: UserInfo) -> Self {
        self.user_id = update.user_id.or(self.user_id);
        self.device_id = update.device_id.or(self.device_id);
        self.user_agent = update.user_agent.or(self.user_agent);
        self.platform = update.platform.or(self.platform);
        self.screen_resolution = update.screen_resolution.or(self.screen_resolution);
        self.language = update.language.or(self.language);
        self.extra.extend(update.extra);
        self
    }
}

/// Origin of a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Uncaught runtime error
    Js,
    /// A script, stylesheet or image failed to load
    Resource,
    /// Unhandled promise rejection
    Promise,
    /// Background request failed or timed out
    Ajax,
}

/// A captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    pub timestamp: i64,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
            filename: None,
            lineno: None,
            colno: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Runtime error. An empty message becomes `Unknown error`.
    pub fn js(message: &str) -> Self {
        let message = if message.is_empty() { "Unknown error" } else { message };
        Self::new(ErrorKind::Js, message)
    }

    pub fn resource_failed(element: &str, source: Option<&str>) -> Self {
        let mut report = Self::new(
            ErrorKind::Resource,
            format!("Resource load failed: {}", element),
        );
        report.filename = Some(source.unwrap_or("unknown").to_string());
        report
    }

    /// Unhandled rejection. Without a reason message it reads `Promise rejection`.
    pub fn promise_rejected(reason: Option<&str>) -> Self {
        Self::new(ErrorKind::Promise, reason.unwrap_or("Promise rejection"))
    }

    pub fn ajax_failed(url: &str) -> Self {
        let mut report = Self::new(ErrorKind::Ajax, format!("Ajax request failed: {}", url));
        report.filename = Some(url.to_string());
        report
    }

    pub fn ajax_timeout(url: &str) -> Self {
        let mut report = Self::new(ErrorKind::Ajax, format!("Ajax request timeout: {}", url));
        report.filename = Some(url.to_string());
        report
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location(mut self, filename: impl Into<String>, lineno: u32, colno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self.colno = Some(colno);
        self
    }
}

/// One element on the path from the document body to a click target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub tag: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
}

impl ElementDescriptor {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// `tag#id`, else `tag.class1.class2`, else `tag`. Tags are lowercased.
    pub fn selector(&self) -> String {
        let mut selector = self.tag.to_lowercase();
        match (&self.id, &self.class_name) {
            (Some(id), _) if !id.is_empty() => {
                selector.push('#');
                selector.push_str(id);
            }
            (_, Some(classes)) if !classes.trim().is_empty() => {
                for class in classes.split_whitespace() {
                    selector.push('.');
                    selector.push_str(class);
                }
            }
            _ => {}
        }
        selector
    }
}

/// Selector path from the outermost element to the target, joined by ` > `.
pub fn element_path(ancestry: &[ElementDescriptor]) -> String {
    ancestry
        .iter()
        .map(ElementDescriptor::selector)
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Payload of a click event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickTarget {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub path: String,
}

impl ClickTarget {
    /// Describe the last element of `ancestry` (outermost first).
    pub fn from_ancestry(ancestry: &[ElementDescriptor], text: Option<&str>) -> Option<Self> {
        let target = ancestry.last()?;
        Some(Self {
            tag: target.tag.to_lowercase(),
            text: text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
            class_name: target.class_name.clone(),
            id: target.id.clone(),
            path: element_path(ancestry),
        })
    }
}
