use crate::analyzer::{CODE_CS_TOKENIZER, CODE_TOKENIZER};
use crate::document::FieldKind;
use tantivy::schema::{
    Field, FieldType, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED,
    STRING,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub stored: bool,
}

/// Field layout of one index.
///
/// An index directory is created with a schema and keeps it for life;
/// reopening it with a different one fails with
/// [`StoreError::SchemaMismatch`](crate::StoreError::SchemaMismatch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSchema {
    fields: Vec<FieldSpec>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, name: &str, kind: FieldKind, stored: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            stored,
        });
        self
    }

    /// Untokenized, case-sensitive, always stored.
    pub fn keyword(self, name: &str) -> Self {
        self.with(name, FieldKind::Keyword, true)
    }

    pub fn text(self, name: &str, stored: bool) -> Self {
        self.with(name, FieldKind::Text, stored)
    }

    pub fn case_sensitive_text(self, name: &str, stored: bool) -> Self {
        self.with(name, FieldKind::CaseSensitiveText, stored)
    }

    pub fn int(self, name: &str) -> Self {
        self.with(name, FieldKind::Int, true)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub(crate) fn to_tantivy(&self) -> Schema {
        let mut builder = Schema::builder();
        for spec in &self.fields {
            match spec.kind {
                FieldKind::Keyword => {
                    builder.add_text_field(&spec.name, STRING | STORED);
                }
                FieldKind::Text => {
                    builder.add_text_field(&spec.name, text_options(CODE_TOKENIZER, spec.stored));
                }
                FieldKind::CaseSensitiveText => {
                    builder
                        .add_text_field(&spec.name, text_options(CODE_CS_TOKENIZER, spec.stored));
                }
                FieldKind::Int => {
                    builder.add_i64_field(&spec.name, INDEXED | STORED);
                }
            }
        }
        builder.build()
    }

    /// Recover the layout an existing index was created with.
    pub(crate) fn from_tantivy(schema: &Schema) -> Self {
        let fields = schema
            .fields()
            .filter_map(|(_, entry)| {
                let kind = match entry.field_type() {
                    FieldType::I64(_) => FieldKind::Int,
                    FieldType::Str(options) => match options
                        .get_indexing_options()
                        .map(TextFieldIndexing::tokenizer)
                    {
                        Some(CODE_TOKENIZER) => FieldKind::Text,
                        Some(CODE_CS_TOKENIZER) => FieldKind::CaseSensitiveText,
                        _ => FieldKind::Keyword,
                    },
                    _ => return None,
                };
                Some(FieldSpec {
                    name: entry.name().to_string(),
                    kind,
                    stored: entry.is_stored(),
                })
            })
            .collect();
        Self { fields }
    }
}

fn text_options(tokenizer: &str, stored: bool) -> TextOptions {
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let options = TextOptions::default().set_indexing_options(indexing);
    if stored {
        options.set_stored()
    } else {
        options
    }
}

/// An [`IndexSchema`] bound to the tantivy schema of an open index.
#[derive(Clone)]
pub(crate) struct BoundSchema {
    spec: IndexSchema,
    schema: Schema,
}

impl BoundSchema {
    pub(crate) fn new(schema: Schema) -> Self {
        Self {
            spec: IndexSchema::from_tantivy(&schema),
            schema,
        }
    }

    pub(crate) fn spec(&self) -> &IndexSchema {
        &self.spec
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<(Field, FieldKind)> {
        let kind = self.spec.field(name)?.kind;
        let field = self.schema.get_field(name).ok()?;
        Some((field, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_survives_tantivy_round_trip() {
        let schema = IndexSchema::new()
            .keyword("id")
            .text("body", true)
            .case_sensitive_text("body_cs", false)
            .int("size");
        assert_eq!(IndexSchema::from_tantivy(&schema.to_tantivy()), schema);
    }

    #[test]
    fn resolve_reports_kind() {
        let bound = BoundSchema::new(IndexSchema::new().keyword("id").int("size").to_tantivy());
        assert_eq!(bound.resolve("size").map(|(_, kind)| kind), Some(FieldKind::Int));
        assert!(bound.resolve("missing").is_none());
    }
}
