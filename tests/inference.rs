use db2access::{
    candidates::{CandidateKind, TypeCandidateSet},
    column_key::ColumnKey,
    export::{ExportOptions, export_tables},
    narrow::FieldTypeNarrower,
    projection::{FieldOrder, RELATIONSHIP_TABLE},
    relate::collect_values,
    relations::{RelationshipHypothesis, RelationshipInferrer, RelationshipOptions},
    source::{FieldLayout, MemorySource, TableLayout},
    values::ValueSetCollector,
    xml::{SchemaWriter, XmlRowWriter, XsdWriter},
};

fn hypothesis(from: (&str, &str), to: (&str, &str)) -> RelationshipHypothesis {
    RelationshipHypothesis {
        from_table: from.0.to_string(),
        from_field: from.1.to_string(),
        to_table: to.0.to_string(),
        to_field: to.1.to_string(),
    }
}

fn survey_source() -> MemorySource {
    MemorySource::new()
        .with_table(
            "samples",
            &["reading", "taken_on", "taken_at", "logged"],
            &[
                &[Some("3"), Some("2024-01-01"), Some("10:15:00"), Some("2024-01-01 10:15:00")],
                &[Some("4.5"), Some("2024-01-02"), None, Some("2024-01-02T11:00:00")],
                &[Some("7"), None, Some("23:59:59"), Some("2024-01-03 08:30:00")],
            ],
        )
        .with_table(
            "codes",
            &["code", "label"],
            &[&[Some("A1"), Some("first")], &[Some("B2"), None]],
        )
}

#[test]
fn export_resolves_each_column_to_its_narrowest_type() {
    let mut source = survey_source();
    let mut rows = XmlRowWriter::new(Vec::new(), "survey.xsd").unwrap();
    let report = export_tables(
        &mut source,
        &mut rows,
        &TypeCandidateSet::standard(),
        &ExportOptions::default(),
    )
    .unwrap();

    let schema = &report.schema;
    assert_eq!(schema.field("samples", "reading").unwrap().kind, CandidateKind::Decimal);
    assert_eq!(schema.field("samples", "reading").unwrap().schema_tag, "xsd:decimal");
    let taken_on = schema.field("samples", "taken_on").unwrap();
    assert_eq!(taken_on.kind, CandidateKind::Date);
    assert_eq!(taken_on.format_hint, Some("Short Date"));
    assert_eq!(schema.field("samples", "taken_at").unwrap().kind, CandidateKind::Time);
    assert_eq!(schema.field("samples", "logged").unwrap().kind, CandidateKind::DateTime);
    assert_eq!(schema.field("codes", "code").unwrap().kind, CandidateKind::BoundedText);
    assert!(schema.relationships.is_empty());
    assert_eq!(report.total_rows(), 5);

    let xml = String::from_utf8(rows.finish().unwrap()).unwrap();
    assert_eq!(xml.matches("<samples>").count(), 3);
    assert_eq!(xml.matches("<taken_on>").count(), 2);
    assert!(!xml.contains("<label></label>"));

    let mut xsd = XsdWriter::new(Vec::new());
    xsd.write_schema(schema).unwrap();
    let xsd = String::from_utf8(xsd.into_inner()).unwrap();
    assert!(xsd.contains("value=\"Long Time\""));
    assert!(xsd.contains("value=\"General Date\""));
}

#[test]
fn columns_excluded_by_declared_type_are_never_seen() {
    let mut source = MemorySource::new();
    source.add_table(
        TableLayout {
            name: "photos".to_string(),
            fields: vec![
                FieldLayout::new("id"),
                FieldLayout {
                    name: "image".to_string(),
                    declared_type: Some("BLOB".to_string()),
                },
            ],
        },
        vec![vec![Some("1".to_string()), Some("\u{1}\u{2}".to_string())]],
    );
    let options = ExportOptions {
        exclude_types: vec!["blob".to_string()],
        ..ExportOptions::default()
    };
    let mut rows = XmlRowWriter::new(Vec::new(), "photos.xsd").unwrap();
    let report =
        export_tables(&mut source, &mut rows, &TypeCandidateSet::standard(), &options).unwrap();

    assert_eq!(report.tables[0].excluded_fields, vec!["image"]);
    assert!(report.schema.field("photos", "image").is_none());
    let xml = String::from_utf8(rows.finish().unwrap()).unwrap();
    assert!(!xml.contains("<image>"));
}

#[test]
fn relationships_only_link_contained_value_sets() {
    let mut source = MemorySource::new()
        .with_table(
            "parents",
            &["P"],
            &[&[Some("a")], &[Some("b")], &[Some("c")], &[Some("d")]],
        )
        .with_table(
            "children",
            &["Q", "R"],
            &[&[Some("a"), Some("x")], &[Some("b"), Some("y")]],
        );
    let mut collector = ValueSetCollector::new();
    collect_values(&mut source, &mut collector, None).unwrap();
    let found = RelationshipInferrer::default().infer(&collector);
    assert_eq!(found, vec![hypothesis(("children", "Q"), ("parents", "P"))]);
}

#[test]
fn exported_relationships_are_filtered_and_tabled() {
    let mut source = MemorySource::new()
        .with_table(
            "A",
            &["x", "flag"],
            &[
                &[Some("1"), Some("0")],
                &[Some("2"), Some("1")],
                &[Some("3"), Some("1")],
            ],
        )
        .with_table("B", &["y"], &[&[Some("1")], &[Some("1")]]);
    let options = ExportOptions {
        relationships: true,
        relationship_options: RelationshipOptions {
            require_unique_target: true,
            ..RelationshipOptions::default()
        },
        field_order: FieldOrder::Alphabetical,
        ..ExportOptions::default()
    };
    let mut rows = XmlRowWriter::new(Vec::new(), "ab.xsd").unwrap();
    let report =
        export_tables(&mut source, &mut rows, &TypeCandidateSet::standard(), &options).unwrap();

    // B.y is also contained in A.flag, but A.flag repeats values.
    assert_eq!(
        report.schema.relationships,
        vec![hypothesis(("B", "y"), ("A", "x"))]
    );
    let names = report.schema.tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["A", "B", RELATIONSHIP_TABLE]);
    let a_fields = report
        .schema
        .table("A")
        .unwrap()
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(a_fields, vec!["flag", "x"]);

    let xml = String::from_utf8(rows.finish().unwrap()).unwrap();
    assert!(xml.contains(&format!("<{RELATIONSHIP_TABLE}>")));
    assert!(xml.contains("<fromTable>B</fromTable>"));
    assert!(xml.contains("<toField>x</toField>"));
}

#[test]
fn narrowing_can_be_read_mid_stream() {
    let key = ColumnKey::new("t", "c");
    let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
    narrower.observe(&key, Some("12"));
    assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Integer);
    narrower.observe(&key, Some("12.5"));
    assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Decimal);
    narrower.observe(&key, None);
    assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Decimal);
    narrower.observe(&key, Some("n/a"));
    assert_eq!(narrower.resolve(&key).kind(), CandidateKind::BoundedText);
    let long = "x".repeat(300);
    narrower.observe(&key, Some(long.as_str()));
    assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Text);
    assert_eq!(narrower.remaining(&key).len(), 1);
}
