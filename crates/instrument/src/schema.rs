//! OpenAPI-style schemas of DTO classes, derived from their declared fields.

use heurist_bytecode::{BytecodeError, ClassFile, ClassName, FieldType};
use serde_json::{json, Map, Value as Json};

fn field_schema(ty: &FieldType) -> Json {
    match ty {
        FieldType::Int | FieldType::Short | FieldType::Byte => json!({ "type": "integer", "format": "int32" }),
        FieldType::Long => json!({ "type": "integer", "format": "int64" }),
        FieldType::Float => json!({ "type": "number", "format": "float" }),
        FieldType::Double => json!({ "type": "number", "format": "double" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Char => json!({ "type": "string" }),
        FieldType::Array(item) => json!({ "type": "array", "items": field_schema(item) }),
        FieldType::Object(name) => match name.as_str() {
            "java/lang/String" | "java/lang/Character" => json!({ "type": "string" }),
            "java/lang/Integer" | "java/lang/Short" | "java/lang/Byte" => {
                json!({ "type": "integer", "format": "int32" })
            }
            "java/lang/Long" => json!({ "type": "integer", "format": "int64" }),
            "java/lang/Double" | "java/lang/Float" => json!({ "type": "number" }),
            "java/lang/Boolean" => json!({ "type": "boolean" }),
            "java/util/List" | "java/util/Collection" | "java/util/Set" => json!({ "type": "array" }),
            "java/util/Map" => json!({ "type": "object" }),
            other => json!({ "$ref": format!("#/components/schemas/{}", ClassName::new(other).simple_name()) }),
        },
    }
}

/// `{"ClassName": {"type": "object", "properties": {...}}}` for the class.
pub fn class_to_schema(class: &ClassFile) -> Result<Json, BytecodeError> {
    let mut properties = Map::new();
    for field in &class.fields {
        properties.insert(field.name.clone(), field_schema(&FieldType::parse(&field.descriptor)?));
    }
    let name = ClassName::new(&class.name).simple_name().to_string();
    let mut schema = Map::new();
    schema.insert(name, json!({ "type": "object", "properties": properties }));
    Ok(Json::Object(schema))
}
