use super::*;
use crate::store::Chapter;
use chrono::Utc;

fn document(chapters: Vec<(&str, &str)>) -> Document {
    Document {
        id: 1,
        title: "Demo Code".to_string(),
        doc_type: "code".to_string(),
        synopsis: "demo".to_string(),
        created_at: Utc::now(),
        chapters: chapters
            .into_iter()
            .enumerate()
            .map(|(position, (title, body))| Chapter {
                id: position as i64 + 1,
                document_id: 1,
                position: position as i64,
                title: title.to_string(),
                paragraphs: vec![body.to_string()],
            })
            .collect(),
    }
}

#[test]
fn test_paths_are_recognized_by_directory_and_name() {
    assert!(is_test_path("app/tests/test_routes.py"));
    assert!(is_test_path("tests/unit/test_db.py"));
    assert!(is_test_path("src/app.test.js"));
    assert!(is_test_path("src/models/user_spec.rb"));
    assert!(!is_test_path("src/app.js"));
    assert!(!is_test_path("root/contest/entry.js"));
}

#[test]
fn only_files_added_by_the_updated_tree_count_as_test_paths() {
    let original = parse_tree("app/\n└── src/\n    └── main.py");
    let updated = parse_tree(
        "app/\n├── src/\n│   └── main.py\n└── tests/\n    └── test_main.py",
    );

    assert_eq!(
        new_test_paths(&original, &updated),
        vec!["app/tests/test_main.py".to_string()]
    );
}

#[test]
fn non_test_additions_to_the_tree_are_ignored() {
    let original = parse_tree("app/\n└── main.py");
    let updated = parse_tree("app/\n├── main.py\n├── helpers.py\n└── test_main.py");

    assert_eq!(
        new_test_paths(&original, &updated),
        vec!["app/test_main.py".to_string()]
    );
}

#[test]
fn qa_sources_skip_filler_and_existing_test_chapters() {
    let doc = document(vec![
        ("Project Structure", "app/\n└── main.py"),
        ("main.py", "print(1)"),
        ("Chapter Summary", "filler"),
        ("test_main.py", "assert True"),
    ]);

    let (structure, code) = qa_source_chapters(&doc);
    assert_eq!(structure, "app/\n└── main.py");
    assert_eq!(code, vec![("main.py".to_string(), "print(1)".to_string())]);
}

#[test]
fn qa_title_derives_from_the_code_document_title() {
    assert_eq!(qa_document_title("Demo Code"), "Demo + QA");
    assert_eq!(qa_document_title("Demo"), "Demo + QA");
}
