use hector_ide::exporter::{export_document, ExportOptions};
use hector_ide::reconciler::{NoResolution, PathMapping, PathResolver};
use hector_ide::store::DocumentStore;
use std::time::Duration;
use tempfile::TempDir;

const TREE: &str = "demo/\n├── src/\n│   ├── app.js\n│   └── db.js\n└── README.md";

struct StubResolver;

impl PathResolver for StubResolver {
    async fn resolve_batch(&self, titles: &[String], _tree_text: &str) -> Vec<PathMapping> {
        titles
            .iter()
            .filter(|t| t.as_str() == "Database Layer")
            .map(|t| PathMapping {
                original_title: t.clone(),
                determined_path: "demo/src/db.js".to_string(),
            })
            .collect()
    }

    async fn resolve_single(&self, _title: &str, _tree_text: &str) -> Option<String> {
        None
    }
}

fn seeded_store(dir: &TempDir) -> DocumentStore {
    let store = DocumentStore::open_or_create(dir.path()).unwrap();
    let chapters = vec![
        ("Project Structure".to_string(), TREE.to_string()),
        ("app.js".to_string(), "console.log('app');".to_string()),
        ("Database Layer".to_string(), "module.exports = {};".to_string()),
        ("README.md".to_string(), "# Demo".to_string()),
    ];
    store
        .save_phase_document("Demo Code", "code", "a demo app", &chapters)
        .unwrap();
    store
}

#[tokio::test]
async fn test_export_round_trip_through_the_store() {
    let workspace = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let store = seeded_store(&workspace);

    let document = store.get_document("Demo Code").unwrap().unwrap();
    let options = ExportOptions {
        strict: false,
        call_delay: Duration::ZERO,
    };
    let summary = export_document(&document, output.path(), &StubResolver, &options)
        .await
        .unwrap();

    // Three chapters plus PROJECT_STRUCTURE.txt.
    assert_eq!(summary.files_written, 4);

    let app = output.path().join("demo/src/app.js");
    assert_eq!(std::fs::read_to_string(app).unwrap(), "console.log('app');");

    // "Database Layer" only matches through the resolver.
    let db = output.path().join("demo/src/db.js");
    assert_eq!(std::fs::read_to_string(db).unwrap(), "module.exports = {};");

    let readme = output.path().join("demo/README.md");
    assert_eq!(std::fs::read_to_string(readme).unwrap(), "# Demo");

    let structure = output.path().join("PROJECT_STRUCTURE.txt");
    assert_eq!(std::fs::read_to_string(structure).unwrap(), TREE);
}

#[tokio::test]
async fn test_strict_export_fails_without_a_resolver_answer() {
    let workspace = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let store = seeded_store(&workspace);

    let document = store.get_document("Demo Code").unwrap().unwrap();
    let options = ExportOptions {
        strict: true,
        call_delay: Duration::ZERO,
    };

    let result = export_document(&document, output.path(), &NoResolution, &options).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_tolerant_export_drops_unresolved_chapters() {
    let workspace = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let store = seeded_store(&workspace);

    let document = store.get_document("Demo Code").unwrap().unwrap();
    let options = ExportOptions {
        strict: false,
        call_delay: Duration::ZERO,
    };

    let summary = export_document(&document, output.path(), &NoResolution, &options)
        .await
        .unwrap();

    // app.js, README.md, PROJECT_STRUCTURE.txt; "Database Layer" is dropped.
    assert_eq!(summary.files_written, 3);
    assert!(!output.path().join("demo/src/db.js").exists());
}
