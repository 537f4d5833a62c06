//! Tests for `#[derive(Model)]`.

#![cfg(feature = "macros")]

use chrono::NaiveDate;
use qfilter::{
    FieldIndex, FieldKind, FieldType, Model, Predicate, Record, RecordValue, Schema, Validator,
};
use serde_json::json;

const FORMATS: &[(&str, &str)] = &[("HC", "Hardcover"), ("PB", "Paperback")];

#[derive(Model)]
struct Publisher {
    #[field(pk)]
    id: i64,
    #[field(char)]
    name: String,
}

#[derive(Model)]
struct Review {
    #[field(integer)]
    rating: u8,
}

#[derive(Model)]
#[model(verbose_name = "book")]
struct Book {
    #[field(pk)]
    id: i64,
    #[field(char)]
    title: String,
    #[field(char, choices = FORMATS)]
    format: String,
    #[field(date, rename = "published")]
    publication_date: NaiveDate,
    #[field(boolean)]
    in_print: bool,
    #[field(one = Publisher)]
    publisher: Option<Publisher>,
    #[field(many = Review)]
    reviews: Vec<Review>,
    #[field(skip)]
    #[allow(dead_code)]
    cache: Vec<u8>,
}

#[derive(Model)]
#[model(name = "Edition")]
struct PrintEdition {
    #[field(one = "Book", required)]
    book: Book,
}

fn dune() -> Book {
    Book {
        id: 1,
        title: "Dune".into(),
        format: "HC".into(),
        publication_date: NaiveDate::from_ymd_opt(1965, 8, 1).unwrap(),
        in_print: true,
        publisher: Some(Publisher {
            id: 7,
            name: "Chilton".into(),
        }),
        reviews: vec![Review { rating: 5 }, Review { rating: 3 }],
        cache: Vec::new(),
    }
}

fn emma() -> Book {
    Book {
        id: 2,
        title: "Emma".into(),
        format: "PB".into(),
        publication_date: NaiveDate::from_ymd_opt(1815, 12, 23).unwrap(),
        in_print: false,
        publisher: None,
        reviews: Vec::new(),
        cache: Vec::new(),
    }
}

fn schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .register::<Book>()
        .register::<Publisher>()
        .register::<Review>()
        .register::<PrintEdition>();
    schema
}

// ============================================================================
// Model description
// ============================================================================

#[test]
fn derives_model_def() {
    let def = Book::model_def();

    assert_eq!(Book::NAME, "Book");
    assert_eq!(def.title(), "Book");
    let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "title", "format", "published", "in_print", "publisher", "reviews"]
    );
    assert_eq!(def.field("id").unwrap().kind, FieldKind::Integer);
    assert_eq!(def.field("publisher").unwrap().to.as_deref(), Some("Publisher"));
    assert_eq!(def.field("reviews").unwrap().kind, FieldKind::ManyToMany);
    assert_eq!(def.field("format").unwrap().choices.as_ref().unwrap().len(), 2);
}

#[test]
fn field_constants() {
    assert_eq!(Book::TITLE, "title");
    assert_eq!(Book::PUBLISHED, "published");
    assert_eq!(Book::IN_PRINT, "in_print");
}

#[test]
fn model_name_override() {
    assert_eq!(PrintEdition::NAME, "Edition");
    assert_eq!(PrintEdition::model_def().field("book").unwrap().to.as_deref(), Some("Book"));
}

#[test]
fn derived_schema_builds_index() {
    let schema = schema();
    let index = FieldIndex::build(&schema, Book::NAME);

    assert_eq!(index.descriptor("published").unwrap().field_type, FieldType::Date);
    assert!(index.find_path("publisher.name").is_some());
    assert!(index.find_path("reviews.rating").is_some());

    let edition = FieldIndex::build(&schema, PrintEdition::NAME);
    assert!(edition.find_path("book.publisher.name").is_some());
}

// ============================================================================
// Record access
// ============================================================================

#[test]
fn derives_record() {
    let book = dune();

    assert_eq!(book.field("title").as_str(), Some("Dune"));
    assert_eq!(book.pk(), Some(1));
    assert!(matches!(book.field("in_print"), RecordValue::Bool(true)));
    assert!(matches!(book.field("published"), RecordValue::Date(_)));
    assert!(matches!(book.field("publisher"), RecordValue::One(Some(_))));
    assert!(matches!(book.field("reviews"), RecordValue::Many(ref r) if r.len() == 2));
    assert!(matches!(book.field("cache"), RecordValue::Missing));
    assert!(matches!(emma().field("publisher"), RecordValue::One(None)));
}

#[test]
fn required_relation_is_always_set() {
    let edition = PrintEdition { book: dune() };
    let RecordValue::One(Some(book)) = edition.field("book") else {
        panic!("expected a related book");
    };
    assert_eq!(book.pk(), Some(1));
}

#[test]
fn filters_derived_records() {
    let schema = schema();
    let index = FieldIndex::build(&schema, Book::NAME);
    let books = vec![dune(), emma()];

    let predicate = Validator::new(&index)
        .compile_value(&json!({
            "connector": "AND",
            "children": [
                {"path": "format", "lookup_expression": "in", "value": ["HC", "PB"]},
                {"path": "reviews.rating", "lookup_expression": "gte", "value": 4}
            ]
        }))
        .unwrap();
    let found: Vec<_> = predicate
        .evaluator()
        .filter(&books)
        .into_iter()
        .map(|b| b.title.as_str())
        .collect();
    assert_eq!(found, vec!["Dune"]);

    let old = Predicate::lookup(Book::PUBLISHED, "year__lt", 1900);
    assert_eq!(old.evaluator().find(&books).map(|b| b.id), Some(2));

    let orphan = Predicate::lookup("publisher", "isnull", true);
    assert_eq!(orphan.evaluator().position(&books), Some(1));

    let by_pk = Predicate::exact("publisher", 7);
    assert_eq!(by_pk.evaluator().count(&books), 1);
}

#[test]
fn keyless_related_records_are_not_null() {
    let books = vec![dune(), emma()];

    // `Review` has no primary key, but Dune's reviews still exist.
    let unreviewed = Predicate::lookup(Book::REVIEWS, "isnull", true);
    assert_eq!(unreviewed.evaluator().position(&books), Some(1));
    assert_eq!(unreviewed.evaluator().count(&books), 1);

    let reviewed = !Predicate::lookup(Book::REVIEWS, "isnull", true);
    assert_eq!(reviewed.evaluator().position(&books), Some(0));
}

#[test]
fn rejects_unknown_choice() {
    let schema = schema();
    let index = FieldIndex::build(&schema, Book::NAME);

    let err = Validator::new(&index)
        .validate_value(&json!({"path": "format", "value": "EB"}))
        .unwrap_err();
    assert_eq!(err.to_string(), "'EB' is not a valid choice for field 'format'.");
}
