use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use notion_api::types::{Page, Parent, PropertyValue, RichText};

use crate::connection::Connection;
use crate::dropbox::FileStore;
use crate::model::{self, FieldSpec, PropertyKind, RawValue, RelationSource};
use crate::picker::Picker;

fn text_property(properties: &BTreeMap<String, PropertyValue>, name: &str) -> Option<String> {
    match properties.get(name)? {
        PropertyValue::RichText { rich_text } => {
            Some(rich_text.iter().map(RichText::plain).collect())
        }
        _ => None,
    }
}

/// Declarative schema for one page mode: its properties, the optional
/// upload step, and the dependent pages to create afterwards.
pub struct PageSpec {
    pub mode: &'static str,
    pub about: &'static str,
    pub fields: Vec<FieldSpec>,
    pub upload: Option<UploadSpec>,
    pub hooks: Vec<HookSpec>,
}

/// Upload step attached to a page schema. Triggered by a CLI switch that is
/// not itself a property; the results overwrite two properties.
pub struct UploadSpec {
    pub flag: &'static str,
    /// Field holding the local file path.
    pub source: &'static str,
    pub folder: &'static str,
    pub subfolder: &'static str,
    /// URL property overwritten with the share link.
    pub link_field: &'static str,
    /// Rich-text property overwritten with the remote path.
    pub path_field: &'static str,
}

/// A dependent page created after a successful parent creation.
pub struct HookSpec {
    pub child_mode: &'static str,
    /// Source property name -> child property name.
    pub property_map: Vec<(&'static str, &'static str)>,
    /// Child relation property receiving the new parent page's id.
    pub foreign_relation: Option<&'static str>,
    /// The hook is skipped when this returns false for the source draft.
    pub condition: fn(&PageDraft) -> bool,
}

/// A page ready to be sent to the API.
#[derive(PartialEq, Clone, Debug)]
pub struct PageDraft {
    pub title: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl PageDraft {
    /// Plain text of a rich-text property, if present.
    pub fn text_of(&self, name: &str) -> Option<String> {
        text_property(&self.properties, name)
    }
}

impl PageSpec {
    /// Derive the clap subcommand for this schema: `title` first, flagged
    /// fields without a default as further required positionals, everything
    /// else as optional flags.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(self.mode)
            .about(self.about)
            .arg(Arg::new("title").required(true).help("Title of the new page"));
        for field in &self.fields {
            let Some(flag) = field.flag else { continue };
            let arg = Arg::new(flag);
            let arg = if field.default.is_none() {
                arg.required(true)
            } else {
                match field.kind {
                    PropertyKind::Checkbox => {
                        // presence flips the schema default, so the parsed
                        // value is always an explicit boolean
                        let default_on = matches!(field.default, Some(RawValue::Flag(true)));
                        let action = if default_on {
                            ArgAction::SetFalse
                        } else {
                            ArgAction::SetTrue
                        };
                        arg.long(flag).action(action)
                    }
                    kind if kind.is_multi() => {
                        arg.long(flag).num_args(1..).action(ArgAction::Append)
                    }
                    _ => arg.long(flag).num_args(1),
                }
            };
            cmd = cmd.arg(arg);
        }
        if let Some(upload) = &self.upload {
            cmd = cmd.arg(
                Arg::new(upload.flag)
                    .long(upload.flag)
                    .action(ArgAction::SetTrue)
                    .help("Upload the file and link it on the page"),
            );
        }
        cmd
    }

    /// Route parsed CLI values back into the schema by field name, applying
    /// normalizers and schema defaults.
    pub fn raw_values(&self, matches: &ArgMatches) -> BTreeMap<&'static str, RawValue> {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            let value = match field.flag {
                None => field.default.clone().unwrap_or(RawValue::Empty),
                Some(flag) => match field.kind {
                    PropertyKind::Checkbox => RawValue::Flag(matches.get_flag(flag)),
                    kind if kind.is_multi() => match matches.get_many::<String>(flag) {
                        Some(given) => RawValue::List(given.cloned().collect()),
                        None => field.default.clone().unwrap_or(RawValue::Empty),
                    },
                    _ => match matches.get_one::<String>(flag) {
                        Some(given) => RawValue::Text(given.clone()),
                        None => field.default.clone().unwrap_or(RawValue::Empty),
                    },
                },
            };
            let value = match (field.prepare, value) {
                (Some(prepare), RawValue::Text(s)) => RawValue::Text(prepare(s)),
                (_, value) => value,
            };
            values.insert(field.name, value);
        }
        values
    }
}

/// Run the full construction pipeline for one page: raw CLI values,
/// relation resolution, wire coercion, and the optional upload step. A
/// failed upload aborts the draft, so no page is created for it.
pub async fn build_draft(
    spec: &PageSpec,
    matches: &ArgMatches,
    relations: &dyn RelationSource,
    picker: &dyn Picker,
    store: &dyn FileStore,
) -> Result<PageDraft> {
    let title = matches
        .get_one::<String>("title")
        .context("missing title")?
        .clone();

    let mut values = spec.raw_values(matches);
    model::resolve_relations(&spec.fields, &mut values, relations, picker).await?;
    let mut properties = model::coerce(&spec.fields, values)?;

    if let Some(upload) = &spec.upload {
        if matches.get_flag(upload.flag) {
            let local = text_property(&properties, upload.source)
                .map(PathBuf::from)
                .with_context(|| format!("field '{}' holds no path to upload", upload.source))?;
            let result = store
                .upload_and_share(&local, upload.folder, upload.subfolder, true)
                .await
                .with_context(|| format!("Failed to upload {}", local.display()))?;
            properties.insert(upload.link_field.to_string(), PropertyValue::url(&result.url));
            properties.insert(
                upload.path_field.to_string(),
                PropertyValue::rich_text(&result.path),
            );
        }
    }

    Ok(PageDraft { title, properties })
}

/// Create the page, then run its hooks synchronously in registration order.
/// A failing hook aborts the remaining ones; the pages created up to that
/// point are not rolled back, the error reports what already exists.
pub async fn create_page(
    conn: &Connection,
    registry: &BTreeMap<&'static str, PageSpec>,
    spec: &PageSpec,
    draft: &PageDraft,
) -> Result<Page> {
    let db = conn.get_db(spec.mode).await?;
    let created = conn
        .notion()
        .create_page(Parent::database(db.id), &draft.title, draft.properties.clone())
        .await
        .with_context(|| format!("Failed to create the '{}' page", spec.mode))?;
    log::info!(
        "Created {} page {}",
        spec.mode,
        created.url.as_deref().unwrap_or(&created.id)
    );

    for hook in &spec.hooks {
        let Some(child) = hook_draft(hook, draft, &created.id) else {
            continue;
        };
        let child_spec = registry.get(hook.child_mode).with_context(|| {
            format!("hook references unregistered mode '{}'", hook.child_mode)
        })?;
        Box::pin(create_page(conn, registry, child_spec, &child))
            .await
            .with_context(|| {
                format!(
                    "hook '{}' failed after page {} was created",
                    hook.child_mode, created.id
                )
            })?;
    }

    Ok(created)
}

/// Build the dependent page for a hook: the mapped subset of the source
/// page's properties plus the foreign relation back to the parent. `None`
/// when the hook's condition rejects the source page.
pub fn hook_draft(hook: &HookSpec, source: &PageDraft, parent_id: &str) -> Option<PageDraft> {
    if !(hook.condition)(source) {
        return None;
    }
    let mut properties = BTreeMap::new();
    for (from, to) in &hook.property_map {
        if let Some(value) = source.properties.get(*from) {
            properties.insert(to.to_string(), value.clone());
        }
    }
    if let Some(relation) = hook.foreign_relation {
        properties.insert(
            relation.to_string(),
            PropertyValue::relation(vec![parent_id.to_string()]),
        );
    }
    Some(PageDraft {
        title: source.title.clone(),
        properties,
    })
}
