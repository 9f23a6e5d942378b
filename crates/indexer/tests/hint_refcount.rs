use codesearch_indexer::{content_schema, document, hint_fields, hint_schema, IndexBuilder};
use codesearch_protocol::{CodeDocument, IndexDescriptor};
use codesearch_store::{IndexPoolRegistry, Query, TantivyStore};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

fn builder(registry: &IndexPoolRegistry) -> IndexBuilder {
    let descriptor = Arc::new(IndexDescriptor::new("hints", "/work", "/idx"));
    let content = registry
        .get_or_open(&descriptor.content_index_path(), &content_schema())
        .unwrap();
    let hints = registry
        .get_or_open(&descriptor.hint_index_path(), &hint_schema())
        .unwrap();
    IndexBuilder::new(descriptor, content, hints)
}

fn code(path: &str, content: &str) -> CodeDocument {
    let mut doc = CodeDocument {
        code_pk: document::new_code_pk(),
        file_name: String::new(),
        file_extension: String::new(),
        file_path: String::new(),
        content: content.to_string(),
        index_date: 0,
        last_write_time: 0,
    };
    document::apply_path(&mut doc, Path::new(path));
    doc
}

fn words(builder: &IndexBuilder) -> Vec<String> {
    let mut words: Vec<String> = builder
        .hint_pool()
        .search(&Query::All, usize::MAX)
        .unwrap()
        .iter()
        .filter_map(|doc| doc.get_str(hint_fields::WORD).map(str::to_string))
        .collect();
    words.sort();
    words
}

#[test]
fn deleting_a_document_keeps_shared_hint_words() {
    let registry = IndexPoolRegistry::new(Arc::new(TantivyStore::in_memory()));
    let builder = builder(&registry);

    builder.add_or_update(code("/work/d1.txt", "fooo barr")).unwrap();
    builder.add_or_update(code("/work/d2.txt", "fooo baaz")).unwrap();
    assert_eq!(words(&builder), vec!["baaz", "barr", "fooo"]);

    builder.delete("/work/d1.txt").unwrap();
    assert_eq!(words(&builder), vec!["baaz", "fooo"]);

    builder.delete("/work/d2.txt").unwrap();
    assert!(words(&builder).is_empty());
}

#[test]
fn hint_words_keep_their_casing_and_respect_length_limits() {
    let registry = IndexPoolRegistry::new(Arc::new(TantivyStore::in_memory()));
    let builder = builder(&registry);

    let long = "x".repeat(200);
    builder
        .add_or_update(code("/work/a.rs", &format!("FooBar foobar abc {long}")))
        .unwrap();
    assert_eq!(words(&builder), vec!["FooBar", "foobar"]);

    let lower = builder
        .hint_pool()
        .search(&Query::term(hint_fields::WORD_LOWER, "foobar"), 10)
        .unwrap();
    assert_eq!(lower.len(), 2);
}

#[test]
fn case_sensitive_reference_check() {
    let registry = IndexPoolRegistry::new(Arc::new(TantivyStore::in_memory()));
    let builder = builder(&registry);

    builder.add_or_update(code("/work/a.rs", "Widget")).unwrap();
    builder.add_or_update(code("/work/b.rs", "widget")).unwrap();
    builder.delete("/work/a.rs").unwrap();
    assert_eq!(words(&builder), vec!["widget"]);
}
