use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{FieldSpec, PropertyKind, RawValue};
use crate::page::{HookSpec, PageDraft, PageSpec, UploadSpec};

const DEFAULT_TAG: &str = "From CLI";
pub const UPLOAD_FOLDER: &str = "Apps";
pub const UPLOAD_SUBFOLDER: &str = "quick-notion";

/// All registered page modes, keyed by CLI mode name. Built once at startup
/// and handed by reference to the dispatcher.
pub fn registry() -> BTreeMap<&'static str, PageSpec> {
    let mut registry = BTreeMap::new();
    for spec in [task(), log(), file(), paper()] {
        debug_assert!(
            spec.fields
                .iter()
                .all(|f| f.related_db.is_some() == (f.kind == PropertyKind::Relation)),
            "relation fields and only relation fields declare a related database"
        );
        registry.insert(spec.mode, spec);
    }
    registry
}

fn tags_field() -> FieldSpec {
    FieldSpec::new("Tags", PropertyKind::MultiSelect)
        .flag("tags")
        .default(RawValue::List(vec![DEFAULT_TAG.to_string()]))
}

fn projects_field() -> FieldSpec {
    FieldSpec::new("Projects", PropertyKind::Relation)
        .flag("projects")
        .related_db("project")
        .default(RawValue::Empty)
}

fn task() -> PageSpec {
    PageSpec {
        mode: "task",
        about: "Create a task entry",
        fields: vec![
            FieldSpec::new("Priority", PropertyKind::Select)
                .flag("priority")
                .default(RawValue::Text("Medium".to_string())),
            tags_field(),
            projects_field(),
        ],
        upload: None,
        hooks: vec![],
    }
}

fn log() -> PageSpec {
    PageSpec {
        mode: "log",
        about: "Create a log entry",
        fields: vec![tags_field(), projects_field()],
        upload: None,
        hooks: vec![],
    }
}

fn file() -> PageSpec {
    PageSpec {
        mode: "file",
        about: "Create a file entry, optionally uploading it to Dropbox",
        fields: vec![
            FieldSpec::new("Path", PropertyKind::RichText)
                .flag("path")
                .prepare(absolute_path),
            FieldSpec::new("Device", PropertyKind::MultiSelect)
                .flag("device")
                .default(RawValue::List(vec![host_name()])),
            tags_field(),
            FieldSpec::new("Description", PropertyKind::RichText)
                .flag("description")
                .default(RawValue::Text(String::new())),
            projects_field(),
            FieldSpec::new("Tasks", PropertyKind::Relation)
                .flag("tasks")
                .related_db("task")
                .default(RawValue::Empty),
            FieldSpec::new("Link", PropertyKind::Url),
            FieldSpec::new("Dropbox Path", PropertyKind::RichText),
            FieldSpec::new("Staging", PropertyKind::Checkbox).default(RawValue::Flag(true)),
        ],
        upload: Some(UploadSpec {
            flag: "upload",
            source: "Path",
            folder: UPLOAD_FOLDER,
            subfolder: UPLOAD_SUBFOLDER,
            link_field: "Link",
            path_field: "Dropbox Path",
        }),
        hooks: vec![HookSpec {
            child_mode: "paper",
            property_map: vec![("Tags", "Tags"), ("Projects", "Projects")],
            foreign_relation: Some("Files"),
            condition: is_pdf,
        }],
    }
}

fn paper() -> PageSpec {
    PageSpec {
        mode: "paper",
        about: "Create a paper entry",
        fields: vec![
            tags_field(),
            projects_field(),
            FieldSpec::new("Files", PropertyKind::Relation)
                .flag("files")
                .related_db("file")
                .default(RawValue::Empty),
        ],
        upload: None,
        hooks: vec![],
    }
}

fn is_pdf(draft: &PageDraft) -> bool {
    draft
        .text_of("Path")
        .map(|p| p.to_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

/// Expand `~` and anchor relative paths to the working directory, without
/// touching the filesystem.
fn absolute_path(raw: String) -> String {
    let path = match raw.strip_prefix("~/") {
        Some(rest) => match home::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(&raw),
        },
        None => PathBuf::from(&raw),
    };
    if path.is_absolute() {
        return path.to_string_lossy().into_owned();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(&path).to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notion_api::types::PropertyValue;
    use std::collections::BTreeMap as Map;

    #[test]
    fn registry_holds_the_four_modes() {
        let registry = registry();
        assert_eq!(
            registry.keys().copied().collect::<Vec<_>>(),
            vec!["file", "log", "paper", "task"]
        );
    }

    #[test]
    fn file_hook_fires_for_pdfs_only() {
        let draft = |path: &str| PageDraft {
            title: "t".to_string(),
            properties: Map::from([("Path".to_string(), PropertyValue::rich_text(path))]),
        };
        assert!(is_pdf(&draft("/tmp/paper.PDF")));
        assert!(is_pdf(&draft("/tmp/paper.pdf")));
        assert!(!is_pdf(&draft("/tmp/notes.md")));
        assert!(!is_pdf(&PageDraft {
            title: "t".to_string(),
            properties: Map::new(),
        }));
    }

    #[test]
    fn absolute_path_anchors_relative_input() {
        let abs = absolute_path("notes/report.pdf".to_string());
        assert!(std::path::Path::new(&abs).is_absolute());
        assert!(abs.ends_with("notes/report.pdf"));

        assert_eq!(absolute_path("/tmp/x.pdf".to_string()), "/tmp/x.pdf");
    }

    #[test]
    fn absolute_path_expands_home() {
        if let Some(home) = home::home_dir() {
            let abs = absolute_path("~/x.pdf".to_string());
            assert_eq!(abs, home.join("x.pdf").to_string_lossy());
        }
    }
}
