//! Argument schemas for tools

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Boolean,
    Integer,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
}

impl ArgKind {
    fn json_type(&self) -> &'static str {
        match self {
            ArgKind::String | ArgKind::Enum(_) => "string",
            ArgKind::Boolean => "boolean",
            ArgKind::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgField {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub description: String,
}

/// Object schema for a tool's arguments
///
/// Validation returns the accepted arguments with unknown fields removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSchema {
    fields: Vec<ArgField>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ArgSchema {
    /// Schema with no fields
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn required(self, name: impl Into<String>, kind: ArgKind, description: impl Into<String>) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: impl Into<String>, kind: ArgKind, description: impl Into<String>) -> Self {
        self.field(name, kind, false, description)
    }

    fn field(mut self, name: impl Into<String>, kind: ArgKind, required: bool, description: impl Into<String>) -> Self {
        self.fields.push(ArgField {
            name: name.into(),
            kind,
            required,
            description: description.into(),
        });
        self
    }

    pub fn fields(&self) -> &[ArgField] {
        &self.fields
    }

    /// Check `args` and return the known fields
    ///
    /// `null` is accepted as an empty object. Every problem found is
    /// reported, joined with `; `.
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, String> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(format!("Expected object, received {}", type_name(other))),
        };

        let mut accepted = Map::new();
        let mut problems = Vec::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    problems.push(format!("{}: Required", field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) => match check_kind(&field.kind, value) {
                    Ok(()) => {
                        accepted.insert(field.name.clone(), value.clone());
                    }
                    Err(message) => problems.push(format!("{}: {}", field.name, message)),
                },
            }
        }

        if problems.is_empty() {
            Ok(accepted)
        } else {
            Err(problems.join("; "))
        }
    }
}

fn check_kind(kind: &ArgKind, value: &Value) -> Result<(), String> {
    let ok = match kind {
        ArgKind::String => value.is_string(),
        ArgKind::Boolean => value.is_boolean(),
        ArgKind::Integer => value.is_i64() || value.is_u64(),
        ArgKind::Enum(allowed) => {
            let Some(s) = value.as_str() else {
                return Err(format!("Expected string, received {}", type_name(value)));
            };
            if allowed.iter().any(|a| a == s) {
                return Ok(());
            }
            let expected: Vec<String> = allowed.iter().map(|a| format!("'{}'", a)).collect();
            return Err(format!(
                "Invalid enum value. Expected {}, received '{}'",
                expected.join(" | "),
                s
            ));
        }
    };
    if ok {
        Ok(())
    } else {
        Err(format!("Expected {}, received {}", kind.json_type(), type_name(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn git_schema() -> ArgSchema {
        ArgSchema::empty().required(
            "command",
            ArgKind::Enum(vec!["status".into(), "branch".into(), "log".into(), "diff".into()]),
            "The Git command to execute.",
        )
    }

    #[test]
    fn test_accepts_and_strips_unknown_fields() {
        let args = git_schema().validate(&json!({"command": "log", "verbose": true})).unwrap();
        assert_eq!(Value::Object(args), json!({"command": "log"}));
    }

    #[test]
    fn test_null_is_empty_object() {
        assert!(ArgSchema::empty().validate(&Value::Null).unwrap().is_empty());
        assert_eq!(git_schema().validate(&Value::Null).unwrap_err(), "command: Required");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            git_schema().validate(&json!({"command": "push"})).unwrap_err(),
            "command: Invalid enum value. Expected 'status' | 'branch' | 'log' | 'diff', received 'push'"
        );
        assert_eq!(
            git_schema().validate(&json!({"command": 3})).unwrap_err(),
            "command: Expected string, received number"
        );
        assert_eq!(
            git_schema().validate(&json!(["status"])).unwrap_err(),
            "Expected object, received array"
        );

        let schema = ArgSchema::empty()
            .optional("limit", ArgKind::Integer, "")
            .optional("flag", ArgKind::Boolean, "");
        assert_eq!(
            schema.validate(&json!({"limit": 1.5, "flag": "yes"})).unwrap_err(),
            "limit: Expected integer, received number; flag: Expected boolean, received string"
        );
    }
}
