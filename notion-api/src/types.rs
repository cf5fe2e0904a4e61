use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Parent reference of a page, as sent in a create-page request.
#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Parent {
    DatabaseId { database_id: String },
    PageId { page_id: String },
}

impl Parent {
    pub fn database(id: impl Into<String>) -> Parent {
        Parent::DatabaseId {
            database_id: id.into(),
        }
    }

    pub fn page(id: impl Into<String>) -> Parent {
        Parent::PageId { page_id: id.into() }
    }
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct TextContent {
    pub content: String,
}

/// One rich text run. Only the `text` shape is written; mention and equation
/// runs coming back from the API keep their `plain_text` readable.
#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct RichText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
}

impl RichText {
    pub fn from_plain(content: impl Into<String>) -> RichText {
        RichText {
            text: Some(TextContent {
                content: content.into(),
            }),
            plain_text: None,
        }
    }

    pub fn plain(&self) -> &str {
        self.plain_text
            .as_deref()
            .or_else(|| self.text.as_ref().map(|t| t.content.as_str()))
            .unwrap_or("")
    }
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct RelationRef {
    pub id: String,
}

/// A type-tagged property value. Untagged on the wire: each variant carries
/// exactly the key the API uses for that property type, so serialization
/// produces e.g. `{"multi_select": [...]}`. Property types this tool does
/// not model fall through to `Other`.
#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
#[serde(untagged)]
pub enum PropertyValue {
    Title { title: Vec<RichText> },
    RichText { rich_text: Vec<RichText> },
    Url { url: String },
    Select { select: SelectOption },
    MultiSelect { multi_select: Vec<SelectOption> },
    Checkbox { checkbox: bool },
    Relation { relation: Vec<RelationRef> },
    Other(serde_json::Value),
}

impl PropertyValue {
    pub fn title(text: &str) -> PropertyValue {
        PropertyValue::Title {
            title: vec![RichText::from_plain(text)],
        }
    }

    pub fn rich_text(text: &str) -> PropertyValue {
        PropertyValue::RichText {
            rich_text: vec![RichText::from_plain(text)],
        }
    }

    pub fn url(url: &str) -> PropertyValue {
        PropertyValue::Url {
            url: url.to_string(),
        }
    }

    pub fn select(name: &str) -> PropertyValue {
        PropertyValue::Select {
            select: SelectOption {
                name: name.to_string(),
            },
        }
    }

    pub fn multi_select(names: Vec<String>) -> PropertyValue {
        PropertyValue::MultiSelect {
            multi_select: names.into_iter().map(|name| SelectOption { name }).collect(),
        }
    }

    pub fn checkbox(checked: bool) -> PropertyValue {
        PropertyValue::Checkbox { checkbox: checked }
    }

    pub fn relation(ids: Vec<String>) -> PropertyValue {
        PropertyValue::Relation {
            relation: ids.into_iter().map(|id| RelationRef { id }).collect(),
        }
    }
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct Page {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,

    #[serde(flatten)]
    pub rest: serde_json::Value,
}

impl Page {
    /// Display name taken from the title property, falling back to the id.
    pub fn title(&self) -> String {
        self.properties
            .values()
            .find_map(|prop| match prop {
                PropertyValue::Title { title } => {
                    Some(title.iter().map(RichText::plain).collect::<String>())
                }
                _ => None,
            })
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichText>,

    #[serde(flatten)]
    pub rest: serde_json::Value,
}

impl Database {
    pub fn name(&self) -> String {
        self.title.iter().map(RichText::plain).collect()
    }
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct QueryDatabaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct QueryDatabaseResponse {
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Debug)]
pub struct CreatePageRequest {
    pub parent: Parent,
    pub properties: BTreeMap<String, PropertyValue>,
}
