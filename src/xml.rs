//! Access-flavoured XML data and XSD schema output.
//!
//! Rows are streamed into a `<dataroot>` document as they are read; the
//! schema is written once inference has finished. Both writers run names
//! through [`element_name`] so the two documents agree.

use std::{borrow::Cow, io::Write};

use anyhow::{Context, Result};
use log::debug;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
    candidates::CandidateKind,
    projection::{ResolvedField, ResolvedSchema},
};

pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const OD_NS: &str = "urn:schemas-microsoft-com:officedata";
pub const DATAROOT: &str = "dataroot";

const INDENT: usize = 2;

/// Receives table rows as `(field, value)` pairs; NULL fields are omitted.
pub trait RowWriter {
    fn write_row(&mut self, table: &str, fields: &[(&str, &str)]) -> Result<()>;
}

pub trait SchemaWriter {
    fn write_schema(&mut self, schema: &ResolvedSchema) -> Result<()>;
}

/// Turns an arbitrary column or table name into a valid XML element name.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`; names that would start
/// with a digit, `-`, `.` or the reserved `xml` prefix get a leading `_`.
pub fn element_name(name: &str) -> Cow<'_, str> {
    let valid_char = |ch: char| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.');
    let needs_prefix = match name.chars().next() {
        None => true,
        Some(first) => {
            !(first.is_alphabetic() || first == '_')
                || name
                    .get(..3)
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"))
        }
    };
    if !needs_prefix && name.chars().all(valid_char) {
        return Cow::Borrowed(name);
    }
    let mut sanitized = String::with_capacity(name.len() + 1);
    if needs_prefix {
        sanitized.push('_');
    }
    sanitized.extend(
        name.chars()
            .map(|ch| if valid_char(ch) { ch } else { '_' }),
    );
    Cow::Owned(sanitized)
}

fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || (ch >= ' ' && ch != '\u{fffe}' && ch != '\u{ffff}')
}

/// Replaces characters XML 1.0 cannot carry (C0 controls, U+FFFE, U+FFFF)
/// with U+FFFD.
pub fn xml_text(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .chars()
            .map(|ch| if is_xml_char(ch) { ch } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

pub struct XmlRowWriter<W: Write> {
    writer: Writer<W>,
    rows: usize,
}

impl<W: Write> XmlRowWriter<W> {
    /// Writes the declaration and opens `<dataroot>` pointing at `schema_location`.
    pub fn new(inner: W, schema_location: &str) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', INDENT);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("Writing XML declaration")?;
        let mut root = BytesStart::new(DATAROOT);
        root.push_attribute(("xmlns:xsi", XSI_NS));
        root.push_attribute(("xsi:noNamespaceSchemaLocation", schema_location));
        writer
            .write_event(Event::Start(root))
            .context("Opening dataroot element")?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Closes `<dataroot>` and hands back the flushed sink.
    pub fn finish(mut self) -> Result<W> {
        self.writer
            .write_event(Event::End(BytesEnd::new(DATAROOT)))
            .context("Closing dataroot element")?;
        let mut inner = self.writer.into_inner();
        inner.flush().context("Flushing XML output")?;
        Ok(inner)
    }
}

impl<W: Write> RowWriter for XmlRowWriter<W> {
    fn write_row(&mut self, table: &str, fields: &[(&str, &str)]) -> Result<()> {
        let table = element_name(table);
        self.writer
            .write_event(Event::Start(BytesStart::new(&*table)))?;
        for (field, value) in fields {
            let field = element_name(field);
            self.writer
                .write_event(Event::Start(BytesStart::new(&*field)))?;
            let text = xml_text(value);
            if let Cow::Owned(_) = text {
                debug!("Table '{table}', field '{field}': replaced characters XML cannot carry");
            }
            self.writer.write_event(Event::Text(BytesText::new(&*text)))?;
            self.writer
                .write_event(Event::End(BytesEnd::new(&*field)))?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(&*table)))
            .with_context(|| format!("Writing row {} of table '{table}'", self.rows + 1))?;
        self.rows += 1;
        Ok(())
    }
}

/// `od:jetType` and `od:sqlSType` for a resolved kind.
pub fn access_types(kind: CandidateKind) -> (&'static str, &'static str) {
    match kind {
        CandidateKind::Integer => ("longinteger", "int"),
        CandidateKind::Decimal => ("decimal", "decimal"),
        CandidateKind::DateTime | CandidateKind::Date | CandidateKind::Time => {
            ("datetime", "datetime")
        }
        CandidateKind::BoundedText => ("text", "nvarchar"),
        CandidateKind::Text => ("memo", "ntext"),
    }
}

pub struct XsdWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XsdWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', INDENT),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<()> {
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<()> {
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn write_field(&mut self, field: &ResolvedField) -> Result<()> {
        let name = element_name(&field.name);
        let (jet_type, sql_type) = access_types(field.kind);
        let mut element = BytesStart::new("xsd:element");
        element.push_attribute(("name", &*name));
        element.push_attribute(("minOccurs", "0"));
        element.push_attribute(("od:jetType", jet_type));
        element.push_attribute(("od:sqlSType", sql_type));

        let Some(max_length) = field.max_length else {
            element.push_attribute(("type", field.schema_tag));
            let Some(format) = field.format_hint else {
                return self.empty(element);
            };
            self.start(element)?;
            self.start(BytesStart::new("xsd:annotation"))?;
            self.start(BytesStart::new("xsd:appinfo"))?;
            let mut property = BytesStart::new("od:fieldProperty");
            property.push_attribute(("name", "Format"));
            property.push_attribute(("type", "10"));
            property.push_attribute(("value", format));
            self.empty(property)?;
            self.end("xsd:appinfo")?;
            self.end("xsd:annotation")?;
            return self.end("xsd:element");
        };

        self.start(element)?;
        self.start(BytesStart::new("xsd:simpleType"))?;
        let mut restriction = BytesStart::new("xsd:restriction");
        restriction.push_attribute(("base", field.schema_tag));
        self.start(restriction)?;
        let mut length = BytesStart::new("xsd:maxLength");
        length.push_attribute(("value", max_length.to_string().as_str()));
        self.empty(length)?;
        self.end("xsd:restriction")?;
        self.end("xsd:simpleType")?;
        self.end("xsd:element")
    }
}

impl<W: Write> SchemaWriter for XsdWriter<W> {
    fn write_schema(&mut self, schema: &ResolvedSchema) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("Writing XSD declaration")?;
        let mut root = BytesStart::new("xsd:schema");
        root.push_attribute(("xmlns:xsd", XSD_NS));
        root.push_attribute(("xmlns:od", OD_NS));
        self.start(root)?;

        let mut dataroot = BytesStart::new("xsd:element");
        dataroot.push_attribute(("name", DATAROOT));
        self.start(dataroot)?;
        self.start(BytesStart::new("xsd:complexType"))?;
        self.start(BytesStart::new("xsd:sequence"))?;
        for table in &schema.tables {
            let mut reference = BytesStart::new("xsd:element");
            reference.push_attribute(("ref", &*element_name(&table.name)));
            reference.push_attribute(("minOccurs", "0"));
            reference.push_attribute(("maxOccurs", "unbounded"));
            self.empty(reference)?;
        }
        self.end("xsd:sequence")?;
        self.end("xsd:complexType")?;
        self.end("xsd:element")?;

        for table in &schema.tables {
            let mut element = BytesStart::new("xsd:element");
            element.push_attribute(("name", &*element_name(&table.name)));
            self.start(element)?;
            self.start(BytesStart::new("xsd:complexType"))?;
            self.start(BytesStart::new("xsd:sequence"))?;
            for field in &table.fields {
                self.write_field(field)
                    .with_context(|| format!("Writing schema for {}.{}", table.name, field.name))?;
            }
            self.end("xsd:sequence")?;
            self.end("xsd:complexType")?;
            self.end("xsd:element")?;
        }

        self.end("xsd:schema")?;
        self.writer.get_mut().flush().context("Flushing XSD output")?;
        Ok(())
    }
}
