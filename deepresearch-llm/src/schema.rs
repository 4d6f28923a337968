//! Declarative output schemas for structured completion calls
//!
//! A [`StructuredSchema`] is used twice per call: to tell the provider which
//! JSON shape to produce, and to validate whatever came back.

use serde_json::{Map, Value};

/// Alternate field names providers are known to use for the same content
const KNOWN_ALIASES: &[(&str, &[&str])] = &[
    (
        "questions",
        &["follow_up_questions", "followUpQuestions", "followup_questions"],
    ),
    (
        "followUpQuestions",
        &["follow_up_questions", "followup_questions", "questions"],
    ),
    ("queries", &["serp_queries", "serpQueries", "search_queries"]),
    ("query", &["serp_query", "search_query"]),
    ("researchGoal", &["research_goal", "goal"]),
    ("learnings", &["key_learnings", "findings"]),
    ("reportMarkdown", &["report", "report_markdown", "markdown"]),
];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    StringList,
    ObjectList(Vec<SchemaField>),
}

impl FieldKind {
    fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::StringList => "array of strings",
            FieldKind::ObjectList(_) => "array of objects",
        }
    }

    fn is_list(&self) -> bool {
        !matches!(self, FieldKind::String)
    }
}

/// One required field of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
    pub aliases: Vec<String>,
}

impl SchemaField {
    fn new(name: &str, kind: FieldKind, description: impl Into<String>) -> Self {
        let aliases = KNOWN_ALIASES
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, aliases)| aliases.iter().map(|a| a.to_string()).collect())
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            kind,
            description: description.into(),
            aliases,
        }
    }

    pub fn string(name: &str, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    pub fn string_list(name: &str, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::StringList, description)
    }

    pub fn object_list(
        name: &str,
        description: impl Into<String>,
        fields: Vec<SchemaField>,
    ) -> Self {
        Self::new(name, FieldKind::ObjectList(fields), description)
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }
}

/// Expected output shape of one completion call
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    name: String,
    fields: Vec<SchemaField>,
}

impl StructuredSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// First list-of-strings field, the target of heuristic list extraction
    pub fn string_list_field(&self) -> Option<&SchemaField> {
        self.fields
            .iter()
            .find(|f| matches!(f.kind, FieldKind::StringList))
    }

    /// Instructions appended to the system prompt describing the JSON to produce
    pub fn instructions(&self) -> String {
        let mut text = String::from(
            "Respond with a single JSON object and nothing else. The object must contain these fields:\n",
        );
        render_fields(&self.fields, 0, &mut text);
        text
    }

    /// Wrap a bare JSON array when the schema has exactly one list field
    pub fn wrap_bare_array(&self, value: Value) -> Value {
        match (value, self.fields.as_slice()) {
            (Value::Array(items), [only]) if only.kind.is_list() => {
                let mut object = Map::new();
                object.insert(only.name.clone(), Value::Array(items));
                Value::Object(object)
            }
            (value, _) => value,
        }
    }

    /// Move known alternate field names onto the declared names, recursively
    pub fn remap_fields(&self, value: &mut Value) {
        remap_object(&self.fields, value);
    }

    /// Check that `value` satisfies every declared field
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        validate_object(&self.fields, value, "$")
    }
}

fn render_fields(fields: &[SchemaField], indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    for field in fields {
        out.push_str(&format!(
            "{}- \"{}\" ({}): {}\n",
            pad,
            field.name,
            field.kind.type_name(),
            field.description
        ));
        if let FieldKind::ObjectList(children) = &field.kind {
            render_fields(children, indent + 1, out);
        }
    }
}

fn remap_object(fields: &[SchemaField], value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };

    for field in fields {
        if !object.contains_key(&field.name) {
            let alias = field
                .aliases
                .iter()
                .find(|alias| object.contains_key(alias.as_str()))
                .cloned();
            if let Some(alias) = alias {
                if let Some(moved) = object.remove(&alias) {
                    object.insert(field.name.clone(), moved);
                }
            }
        }

        if let FieldKind::ObjectList(children) = &field.kind {
            if let Some(Value::Array(items)) = object.get_mut(&field.name) {
                for item in items.iter_mut() {
                    remap_object(children, item);
                }
            }
        }
    }
}

fn validate_object(fields: &[SchemaField], value: &Value, path: &str) -> Result<(), String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("{} is not an object", path))?;

    for field in fields {
        let field_path = format!("{}.{}", path, field.name);
        let field_value = object
            .get(&field.name)
            .ok_or_else(|| format!("missing field {}", field_path))?;

        match &field.kind {
            FieldKind::String => {
                if !field_value.is_string() {
                    return Err(format!("{} must be a string", field_path));
                }
            }
            FieldKind::StringList => {
                let items = field_value
                    .as_array()
                    .ok_or_else(|| format!("{} must be an array", field_path))?;
                if let Some(index) = items.iter().position(|item| !item.is_string()) {
                    return Err(format!("{}[{}] must be a string", field_path, index));
                }
            }
            FieldKind::ObjectList(children) => {
                let items = field_value
                    .as_array()
                    .ok_or_else(|| format!("{} must be an array", field_path))?;
                for (index, item) in items.iter().enumerate() {
                    validate_object(children, item, &format!("{}[{}]", field_path, index))?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queries_schema() -> StructuredSchema {
        StructuredSchema::new("serp_queries").field(SchemaField::object_list(
            "queries",
            "List of SERP queries",
            vec![
                SchemaField::string("query", "The SERP query"),
                SchemaField::string("researchGoal", "Goal of the query"),
            ],
        ))
    }

    #[test]
    fn remaps_nested_aliases() {
        let schema = queries_schema();
        let mut value = json!({
            "serp_queries": [{"query": "a", "research_goal": "g"}]
        });

        schema.remap_fields(&mut value);
        assert_eq!(value, json!({"queries": [{"query": "a", "researchGoal": "g"}]}));
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn declared_name_wins_over_alias() {
        let schema = StructuredSchema::new("feedback")
            .field(SchemaField::string_list("questions", "Questions"));
        let mut value = json!({"questions": ["a"], "follow_up_questions": ["b"]});

        schema.remap_fields(&mut value);
        assert_eq!(value["questions"], json!(["a"]));
    }

    #[test]
    fn validation_reports_the_failing_path() {
        let schema = queries_schema();
        let error = schema
            .validate(&json!({"queries": [{"query": "a"}]}))
            .unwrap_err();
        assert!(error.contains("$.queries[0].researchGoal"));

        let error = schema.validate(&json!({"queries": "nope"})).unwrap_err();
        assert!(error.contains("must be an array"));
    }

    #[test]
    fn bare_arrays_are_wrapped_for_single_list_schemas() {
        let schema = StructuredSchema::new("feedback")
            .field(SchemaField::string_list("questions", "Questions"));
        let value = schema.wrap_bare_array(json!(["a", "b"]));
        assert_eq!(value, json!({"questions": ["a", "b"]}));
    }

    #[test]
    fn instructions_list_every_field() {
        let text = queries_schema().instructions();
        assert!(text.contains("\"queries\" (array of objects)"));
        assert!(text.contains("  - \"researchGoal\" (string)"));
    }
}
