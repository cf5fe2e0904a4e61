use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use notion_api::types::PropertyValue;

use crate::picker::Picker;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PropertyKind {
    RichText,
    Url,
    Select,
    MultiSelect,
    Checkbox,
    Relation,
}

impl PropertyKind {
    /// Whether the CLI side takes a list of values rather than one.
    pub fn is_multi(self) -> bool {
        matches!(self, PropertyKind::MultiSelect | PropertyKind::Relation)
    }
}

/// A raw field value on its way through the validation passes.
#[derive(PartialEq, Clone, Debug)]
pub enum RawValue {
    Empty,
    Text(String),
    List(Vec<String>),
    Flag(bool),
    /// Already in wire form; pass 2 must not wrap it again.
    Resolved(PropertyValue),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }
}

/// One property of a page schema. Every field declares its remote type; the
/// CLI flag, default and related database are optional metadata consumed by
/// the parser builder and the validation passes.
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    /// Long flag name, without dashes. `None` keeps the field off the CLI.
    pub flag: Option<&'static str>,
    /// Schema default. A flagged field without one becomes a required
    /// positional argument.
    pub default: Option<RawValue>,
    /// Logical name of the related database. Relation fields only.
    pub related_db: Option<&'static str>,
    /// Normalizer applied to raw text input before validation.
    pub prepare: Option<fn(String) -> String>,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: PropertyKind) -> FieldSpec {
        FieldSpec {
            name,
            kind,
            flag: None,
            default: None,
            related_db: None,
            prepare: None,
        }
    }

    pub fn flag(mut self, flag: &'static str) -> FieldSpec {
        self.flag = Some(flag);
        self
    }

    pub fn default(mut self, value: RawValue) -> FieldSpec {
        self.default = Some(value);
        self
    }

    pub fn related_db(mut self, db: &'static str) -> FieldSpec {
        self.related_db = Some(db);
        self
    }

    pub fn prepare(mut self, f: fn(String) -> String) -> FieldSpec {
        self.prepare = Some(f);
        self
    }
}

/// Source of entries for relation resolution, keyed by logical database
/// name. `Connection` implements this against the live API; tests stub it.
#[async_trait]
pub trait RelationSource {
    /// All entries of the related database as (display name, id) pairs.
    async fn entries(&self, db_name: &str) -> Result<Vec<(String, String)>>;
}

/// Display-name index for a relation pick. Later entries win on duplicate
/// names, matching the remote's iteration order.
pub fn name_index(entries: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut index: Vec<(String, String)> = Vec::new();
    for (name, id) in entries {
        if let Some(slot) = index.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = id;
        } else {
            index.push((name, id));
        }
    }
    index
}

/// Pass 1: fill every unset relation field by asking the picker to choose
/// from the related database's entries. Non-empty values pass through
/// untouched. Blocks on terminal input in the interactive picker.
pub async fn resolve_relations(
    fields: &[FieldSpec],
    values: &mut BTreeMap<&'static str, RawValue>,
    source: &dyn RelationSource,
    picker: &dyn Picker,
) -> Result<()> {
    for field in fields {
        if field.kind != PropertyKind::Relation {
            continue;
        }
        let unset = values
            .get(field.name)
            .map(RawValue::is_empty)
            .unwrap_or(true);
        if !unset {
            continue;
        }
        let db = field
            .related_db
            .with_context(|| format!("field '{}' declares no related database", field.name))?;
        let index = name_index(source.entries(db).await?);
        let options: Vec<String> = index.iter().map(|(name, _)| name.clone()).collect();
        let prompt = format!("Please choose your {}(s)", field.name);
        let picks = picker.pick(&prompt, &options)?;
        let ids = picks
            .into_iter()
            .filter_map(|i| index.get(i))
            .map(|(_, id)| id.clone())
            .collect();
        values.insert(field.name, RawValue::Resolved(PropertyValue::relation(ids)));
    }
    Ok(())
}

/// Pass 2: wrap every raw value into the type-tagged wire representation.
/// Empty fields are omitted from the page, except relations, which become
/// an empty reference list.
pub fn coerce(
    fields: &[FieldSpec],
    mut values: BTreeMap<&'static str, RawValue>,
) -> Result<BTreeMap<String, PropertyValue>> {
    let mut properties = BTreeMap::new();
    for field in fields {
        let value = values.remove(field.name).unwrap_or(RawValue::Empty);
        let wire = match (field.kind, value) {
            (_, RawValue::Resolved(v)) => v,
            (PropertyKind::Relation, RawValue::Empty) => PropertyValue::relation(vec![]),
            (PropertyKind::Relation, RawValue::List(ids)) => PropertyValue::relation(ids),
            (_, RawValue::Empty) => continue,
            (PropertyKind::RichText, RawValue::Text(s)) => PropertyValue::rich_text(&s),
            (PropertyKind::Url, RawValue::Text(s)) => PropertyValue::url(&s),
            (PropertyKind::Select, RawValue::Text(s)) => PropertyValue::select(&s),
            (PropertyKind::MultiSelect, RawValue::List(v)) => PropertyValue::multi_select(v),
            (PropertyKind::Checkbox, RawValue::Flag(b)) => PropertyValue::checkbox(b),
            (kind, value) => bail!(
                "field '{}': cannot coerce {value:?} into a {kind:?} property",
                field.name
            ),
        };
        properties.insert(field.name.to_string(), wire);
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(properties: &BTreeMap<String, PropertyValue>, name: &str) -> serde_json::Value {
        serde_json::to_value(properties.get(name).unwrap()).unwrap()
    }

    #[test]
    fn coerce_tags_each_kind_with_its_type() {
        let fields = vec![
            FieldSpec::new("Note", PropertyKind::RichText),
            FieldSpec::new("Link", PropertyKind::Url),
            FieldSpec::new("Priority", PropertyKind::Select),
            FieldSpec::new("Tags", PropertyKind::MultiSelect),
            FieldSpec::new("Staging", PropertyKind::Checkbox),
            FieldSpec::new("Projects", PropertyKind::Relation).related_db("project"),
        ];
        let values = BTreeMap::from([
            ("Note", RawValue::Text("hello".into())),
            ("Link", RawValue::Text("https://example.com".into())),
            ("Priority", RawValue::Text("Medium".into())),
            ("Tags", RawValue::List(vec!["From CLI".into()])),
            ("Staging", RawValue::Flag(true)),
            ("Projects", RawValue::List(vec!["id-1".into()])),
        ]);

        let properties = coerce(&fields, values).unwrap();

        assert_eq!(
            wire(&properties, "Note"),
            json!({ "rich_text": [{ "text": { "content": "hello" } }] })
        );
        assert_eq!(wire(&properties, "Link"), json!({ "url": "https://example.com" }));
        assert_eq!(
            wire(&properties, "Priority"),
            json!({ "select": { "name": "Medium" } })
        );
        assert_eq!(
            wire(&properties, "Tags"),
            json!({ "multi_select": [{ "name": "From CLI" }] })
        );
        assert_eq!(wire(&properties, "Staging"), json!({ "checkbox": true }));
        assert_eq!(
            wire(&properties, "Projects"),
            json!({ "relation": [{ "id": "id-1" }] })
        );
    }

    #[test]
    fn coerce_never_rewraps_resolved_values() {
        let fields = vec![FieldSpec::new("Projects", PropertyKind::Relation).related_db("project")];
        let resolved = PropertyValue::relation(vec!["id-9".into()]);
        let values = BTreeMap::from([("Projects", RawValue::Resolved(resolved.clone()))]);

        let properties = coerce(&fields, values).unwrap();
        assert_eq!(properties.get("Projects"), Some(&resolved));
    }

    #[test]
    fn coerce_empty_relation_becomes_empty_list() {
        let fields = vec![FieldSpec::new("Projects", PropertyKind::Relation).related_db("project")];
        let properties = coerce(&fields, BTreeMap::new()).unwrap();
        assert_eq!(wire(&properties, "Projects"), json!({ "relation": [] }));
    }

    #[test]
    fn coerce_omits_empty_non_relation_fields() {
        let fields = vec![FieldSpec::new("Link", PropertyKind::Url)];
        let properties = coerce(&fields, BTreeMap::new()).unwrap();
        assert!(properties.is_empty());
    }

    #[test]
    fn coerce_rejects_kind_mismatches() {
        let fields = vec![FieldSpec::new("Staging", PropertyKind::Checkbox)];
        let values = BTreeMap::from([("Staging", RawValue::Text("yes".into()))]);
        assert!(coerce(&fields, values).is_err());
    }

    #[test]
    fn name_index_keeps_the_last_id_on_duplicates() {
        let index = name_index(vec![
            ("Alpha".into(), "id-1".into()),
            ("Beta".into(), "id-2".into()),
            ("Alpha".into(), "id-3".into()),
        ]);
        assert_eq!(
            index,
            vec![
                ("Alpha".to_string(), "id-3".to_string()),
                ("Beta".to_string(), "id-2".to_string()),
            ]
        );
    }

    struct StubSource(Vec<(String, String)>);

    #[async_trait]
    impl RelationSource for StubSource {
        async fn entries(&self, _db_name: &str) -> Result<Vec<(String, String)>> {
            Ok(self.0.clone())
        }
    }

    struct StubPicker(Vec<usize>);

    impl Picker for StubPicker {
        fn pick(&self, _prompt: &str, _options: &[String]) -> Result<Vec<usize>> {
            Ok(self.0.clone())
        }
    }

    struct PanicSource;

    #[async_trait]
    impl RelationSource for PanicSource {
        async fn entries(&self, _db_name: &str) -> Result<Vec<(String, String)>> {
            panic!("pass 1 must not query for a non-empty relation value");
        }
    }

    #[tokio::test]
    async fn pass1_resolves_unset_relations_through_the_picker() {
        let fields = vec![FieldSpec::new("Projects", PropertyKind::Relation).related_db("project")];
        let mut values = BTreeMap::from([("Projects", RawValue::Empty)]);
        let source = StubSource(vec![
            ("Alpha".into(), "id-1".into()),
            ("Beta".into(), "id-2".into()),
        ]);

        resolve_relations(&fields, &mut values, &source, &StubPicker(vec![1])).await.unwrap();

        assert_eq!(
            values.get("Projects"),
            Some(&RawValue::Resolved(PropertyValue::relation(vec![
                "id-2".into()
            ])))
        );
    }

    #[tokio::test]
    async fn pass1_with_an_empty_pick_yields_an_empty_relation() {
        let fields = vec![FieldSpec::new("Projects", PropertyKind::Relation).related_db("project")];
        let mut values = BTreeMap::new();
        let source = StubSource(vec![("Alpha".into(), "id-1".into())]);

        resolve_relations(&fields, &mut values, &source, &StubPicker(vec![])).await.unwrap();

        assert_eq!(
            values.get("Projects"),
            Some(&RawValue::Resolved(PropertyValue::relation(vec![])))
        );
    }

    #[tokio::test]
    async fn pass1_leaves_non_empty_relations_untouched() {
        let fields = vec![FieldSpec::new("Projects", PropertyKind::Relation).related_db("project")];
        let mut values = BTreeMap::from([("Projects", RawValue::List(vec!["id-7".into()]))]);

        resolve_relations(&fields, &mut values, &PanicSource, &StubPicker(vec![0])).await.unwrap();

        assert_eq!(
            values.get("Projects"),
            Some(&RawValue::List(vec!["id-7".to_string()]))
        );
    }
}
