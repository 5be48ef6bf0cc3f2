//! End-to-end tests for the workspace controller

use super::*;
use approx::assert_relative_eq;
use std::cell::RefCell;
use std::rc::Rc;
use xsdtree_fragments::{FragmentError, NodeKind};
use xsdtree_graph::NodeId;
use xsdtree_select::SelectError;

/// library → AND(book+, OR(journal 0.35, magazine 0.65)) ;
/// book → AND(title, OR(isbn 0.9, issn 0.1)).
const LIBRARY: &str = r#"{
    "begin-c/library-c": {
        "expression": { "type": "AND", "value": "AND", "children": [
            { "type": "LEAF", "value": "book-c", "maxOccurs": "unbounded" },
            { "type": "OR", "value": "OR", "children": [
                { "type": "LEAF", "value": "journal-s", "probability": 0.35 },
                { "type": "LEAF", "value": "magazine-s", "probability": 0.65 }
            ]}
        ]},
        "typoSpace": { "library": 0.8, "libary": 0.2 },
        "semanticSpace": { "library": 0.7, "archive": 0.3 },
        "types": { "string": 1.0 }
    },
    "library-c/book-c": {
        "expression": { "type": "AND", "value": "AND", "children": [
            { "type": "LEAF", "value": "title-s" },
            { "type": "OR", "value": "OR", "children": [
                { "type": "LEAF", "value": "isbn-s", "probability": 0.9 },
                { "type": "LEAF", "value": "issn-s", "probability": 0.1 }
            ]}
        ]},
        "attributes": {
            "lang": { "probability": 0.7, "types": { "language": 0.6, "string": 0.4 } },
            "edition": { "probability": 0.3, "types": { "integer": 1.0 } }
        },
        "types": { "string": 1.0 }
    },
    "library-c/journal-s": { "types": { "string": 1.0 } },
    "library-c/magazine-s": { "types": { "string": 0.8, "token": 0.2 } },
    "book-c/title-s": { "types": { "string": 0.9, "normalizedString": 0.1 } },
    "book-c/isbn-s": { "types": { "string": 0.5, "token": 0.5 } },
    "book-c/issn-s": { "types": { "string": 1.0 } }
}"#;

fn workspace() -> WorkspaceController {
    WorkspaceController::from_json(LIBRARY, WorkspaceConfig::default()).unwrap()
}

fn find(ws: &WorkspaceController, name: &str) -> NodeId {
    ws.model()
        .graph()
        .iter()
        .find(|node| node.data().name == name)
        .map(|node| node.id())
        .unwrap()
}

fn is_chosen(ws: &WorkspaceController, name: &str) -> bool {
    ws.model().data(find(ws, name)).unwrap().chosen
}

#[test]
fn test_initial_pass_selects_most_probable_variant() {
    let ws = workspace();
    assert!(is_chosen(&ws, "library"));
    assert!(is_chosen(&ws, "book"));
    assert!(is_chosen(&ws, "title"));
    assert!(is_chosen(&ws, "isbn"));
    assert!(!is_chosen(&ws, "issn"));
    assert!(is_chosen(&ws, "magazine"));
    assert!(!is_chosen(&ws, "journal"));

    let book = ws.model().data(find(&ws, "book")).unwrap();
    assert_eq!(book.chosen_attributes, vec!["lang"]);
}

#[test]
fn test_override_leaves_other_branches_alone() {
    let mut ws = workspace();
    let issn = find(&ws, "issn");
    ws.select_subtree(issn).unwrap();

    assert!(is_chosen(&ws, "issn"));
    assert!(!is_chosen(&ws, "isbn"));
    // the OR under the root is not an ancestor of issn
    assert!(is_chosen(&ws, "magazine"));
    assert!(!is_chosen(&ws, "journal"));

    ws.reset_selection().unwrap();
    assert!(is_chosen(&ws, "isbn"));
    assert!(!is_chosen(&ws, "issn"));
}

#[test]
fn test_inspection_cursor_accepts_leaves_only() {
    let mut ws = workspace();
    let book = find(&ws, "book");
    assert!(ws.inspect(book).unwrap());
    assert_eq!(ws.inspected(), Some(book));

    let or = ws
        .model()
        .graph()
        .iter()
        .find(|node| node.data().kind == NodeKind::Or)
        .map(|node| node.id())
        .unwrap();
    assert!(!ws.inspect(or).unwrap());
    assert_eq!(ws.inspected(), Some(book));

    let err = ws.inspect(NodeId::new(10_000)).unwrap_err();
    assert!(err.is_node_not_found());
    assert_eq!(ws.inspected(), Some(book));

    ws.clear_inspection();
    assert!(ws.inspection().is_none());
}

#[test]
fn test_inspection_exposes_candidate_spaces() {
    let mut ws = workspace();
    ws.inspect(ws.model().root_id()).unwrap();
    let detail = ws.inspection().unwrap();
    let fragment = detail.fragment.unwrap();
    assert_relative_eq!(fragment.typo_space["libary"], 0.2);
    assert_relative_eq!(fragment.semantic_space["archive"], 0.3);
    assert_eq!(detail.node.name, "library");

    let json = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["fragmentKind"], "complex");
    assert_eq!(json["node"]["chosen"], true);
}

#[test]
fn test_observers_see_selection_changes() {
    let mut ws = workspace();
    let isbn = find(&ws, "isbn");
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let subscription = ws
        .subscribe(isbn, move |id, node| sink.borrow_mut().push((id, node.chosen)))
        .unwrap();

    let issn = find(&ws, "issn");
    ws.select_subtree(issn).unwrap();
    ws.select_subtree(issn).unwrap();
    assert_eq!(*events.borrow(), vec![(isbn, false)]);

    assert!(ws.unsubscribe(subscription));
    ws.select_subtree(isbn).unwrap();
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn test_final_schema_follows_edits() {
    let mut ws = workspace();
    let book = find(&ws, "book");
    ws.rename(book, "Book").unwrap();
    assert!(ws.toggle_attribute(book, "edition").unwrap());

    let schema = ws.build_final_schema().unwrap();
    assert_eq!(schema.len(), ws.model().chosen_leaf_count());

    let json: serde_json::Value = serde_json::from_str(&ws.final_schema_json().unwrap()).unwrap();
    assert_eq!(json["name"], "library");
    let book_json = &json["children"][0];
    assert_eq!(book_json["name"], "Book");
    assert_eq!(book_json["maxOccurs"], "unbounded");
    assert_eq!(book_json["attributes"]["lang"], "language");
    assert_eq!(book_json["attributes"]["edition"], "integer");
    let attribute_order: Vec<&String> = book_json["attributes"].as_object().unwrap().keys().collect();
    assert_eq!(attribute_order.len(), 2);
    assert_eq!(json["children"][1]["name"], "magazine");
}

#[test]
fn test_invalid_edits_are_rejected() {
    let mut ws = workspace();
    let book = find(&ws, "book");
    assert!(matches!(
        ws.choose_type(book, "gYear"),
        Err(SessionError::Select(SelectError::UnknownType { .. }))
    ));
    assert!(matches!(
        ws.toggle_attribute(book, "colour"),
        Err(SessionError::Select(SelectError::UnknownAttribute { .. }))
    ));
    assert!(ws.choose_type(find(&ws, "title"), "normalizedString").unwrap());
}

#[test]
fn test_model_json_strips_identities() {
    let ws = workspace();
    let json: serde_json::Value = serde_json::from_str(&ws.model_json().unwrap()).unwrap();
    assert_eq!(json["type"], "LEAF");
    assert_eq!(json["value"], "begin-c/library-c");
    assert!(json.get("id").is_none());
    assert!(json["children"].as_array().unwrap().len() >= 2);
}

#[test]
fn test_bad_input_is_reported() {
    let err = WorkspaceController::from_json("{}", WorkspaceConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SessionError::Fragments(FragmentError::InvalidSchemaData(_))
    ));

    let two_roots = r#"{ "begin-c/a-c": {}, "begin-c/b-c": {} }"#;
    let err = WorkspaceController::from_json(two_roots, WorkspaceConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SessionError::Fragments(FragmentError::DuplicateRootData { .. })
    ));
}

#[test]
fn test_config_threshold_changes_attributes() {
    let config = WorkspaceConfig::from_json(r#"{ "selection": { "attribute_threshold": 0.25 } }"#)
        .unwrap();
    let ws = WorkspaceController::from_json(LIBRARY, config).unwrap();
    let book = ws.model().data(find(&ws, "book")).unwrap();
    assert_eq!(book.chosen_attributes, vec!["lang", "edition"]);

    assert!(matches!(
        WorkspaceConfig::from_json(r#"{ "selection": { "attribute_threshold": 1.5 } }"#),
        Err(SessionError::Config(_))
    ));
}
