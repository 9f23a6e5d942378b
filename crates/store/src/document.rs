use crate::error::{Result, StoreError};
use crate::schema::BoundSchema;
use serde::{Deserialize, Serialize};
use tantivy::schema::Value;
use tantivy::TantivyDocument;

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Untokenized, matched as a whole and case-sensitively.
    Keyword,
    /// Tokenized and lowercased.
    Text,
    /// Tokenized, original casing kept.
    CaseSensitiveText,
    /// Integer value, only matched as a whole.
    Int,
}

impl FieldKind {
    pub const fn is_tokenized(self) -> bool {
        matches!(self, Self::Text | Self::CaseSensitiveText)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Str(_) => None,
        }
    }

    /// Value as it is indexed in a string field.
    pub fn to_keyword(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Str(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub stored: bool,
}

/// A flat list of named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn add_keyword(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field {
            name: name.to_string(),
            kind: FieldKind::Keyword,
            value: FieldValue::Str(value.into()),
            stored: true,
        })
    }

    pub fn add_text(&mut self, name: &str, value: impl Into<String>, stored: bool) -> &mut Self {
        self.add(Field {
            name: name.to_string(),
            kind: FieldKind::Text,
            value: FieldValue::Str(value.into()),
            stored,
        })
    }

    pub fn add_case_sensitive_text(
        &mut self,
        name: &str,
        value: impl Into<String>,
        stored: bool,
    ) -> &mut Self {
        self.add(Field {
            name: name.to_string(),
            kind: FieldKind::CaseSensitiveText,
            value: FieldValue::Str(value.into()),
            stored,
        })
    }

    pub fn add_int(&mut self, name: &str, value: i64) -> &mut Self {
        self.add(Field {
            name: name.to_string(),
            kind: FieldKind::Int,
            value: FieldValue::Int(value),
            stored: true,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|field| field.value.as_str())
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(|field| field.value.as_int())
    }

    /// Copy of the document with non-stored fields removed.
    pub fn stored(&self) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|field| field.stored)
                .cloned()
                .collect(),
        }
    }
}

impl Document {
    pub(crate) fn to_tantivy(&self, schema: &BoundSchema) -> Result<TantivyDocument> {
        let mut out = TantivyDocument::default();
        for field in &self.fields {
            let (target, kind) = schema
                .resolve(&field.name)
                .ok_or_else(|| StoreError::UnknownField(field.name.clone()))?;
            match (kind, &field.value) {
                (FieldKind::Int, FieldValue::Int(value)) => out.add_i64(target, *value),
                (FieldKind::Int, FieldValue::Str(value)) => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        StoreError::Other(format!(
                            "field {} expects an integer, got {value:?}",
                            field.name
                        ))
                    })?;
                    out.add_i64(target, parsed);
                }
                (_, value) => out.add_text(target, value.to_keyword()),
            }
        }
        Ok(out)
    }

    /// Stored fields of a hit, in schema order.
    pub(crate) fn from_tantivy(doc: &TantivyDocument, schema: &BoundSchema) -> Self {
        let mut out = Document::new();
        for spec in schema.spec().fields().iter().filter(|spec| spec.stored) {
            let Some((field, _)) = schema.resolve(&spec.name) else {
                continue;
            };
            for value in doc.get_all(field) {
                let value = match spec.kind {
                    FieldKind::Int => value.as_i64().map(FieldValue::Int),
                    _ => value.as_str().map(|text| FieldValue::Str(text.to_string())),
                };
                if let Some(value) = value {
                    out.add(Field {
                        name: spec.name.clone(),
                        kind: spec.kind,
                        value,
                        stored: true,
                    });
                }
            }
        }
        out
    }
}
