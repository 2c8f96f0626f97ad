//! JSON conversion of values, expressions and DataSets.
//!
//! Expressions serialize as objects tagged with a `"$type"` discriminator.
//! A [`ConverterRegistry`] resolves the converter for each tag and the
//! value converter for each [`DataType`]; [`ConverterRegistry::with_defaults`]
//! registers every expression node kind and every primitive type.
//!
//! Values use their natural JSON form except: binary is base64 text, date/time
//! is ISO-8601 with milliseconds and guids are hyphenated text.

mod dataset;

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use modelset_core::{
    parse_datetime, BinaryOp, DataType, Expr, FunctionKey, UnaryOp, Value, DATETIME_FORMAT,
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{DataError, DataResult};
use crate::schema::Schema;

/// Discriminator key of tagged objects.
pub const TYPE_TAG: &str = "$type";

fn invalid(message: impl fmt::Display) -> DataError {
    DataError::Json(<serde_json::Error as serde::de::Error>::custom(message))
}

// --- Values ---

/// JSON form of a stored value. Non-finite floats have none.
pub fn value_to_json(value: &Value) -> DataResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| invalid(format!("{} has no JSON representation", f)))?,
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::DateTime(dt) => JsonValue::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::Guid(g) => JsonValue::String(g.hyphenated().to_string()),
        Value::Binary(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
    })
}

/// Parse a value of `data_type` from its JSON form.
pub fn value_from_json(data_type: DataType, json: &JsonValue) -> DataResult<Value> {
    default_value_converter(data_type).from_json(json)
}

/// Converts values of one primitive type.
pub trait ValueConverter: Send + Sync {
    fn data_type(&self) -> DataType;

    fn to_json(&self, value: &Value) -> DataResult<JsonValue> {
        value_to_json(&value.clone().conform(self.data_type())?)
    }

    /// Parse a non-null JSON value. Null is handled by [`Self::from_json`].
    fn parse(&self, json: &JsonValue) -> DataResult<Value>;

    fn from_json(&self, json: &JsonValue) -> DataResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        self.parse(json)
    }
}

fn mismatch(data_type: DataType, json: &JsonValue) -> DataError {
    invalid(format!("expected a {} value, found {}", data_type, json))
}

#[derive(Debug, Clone, Copy)]
pub struct BooleanConverter;

impl ValueConverter for BooleanConverter {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        json.as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| mismatch(DataType::Boolean, json))
    }
}

/// Range-checked integer types.
#[derive(Debug, Clone, Copy)]
pub struct IntegerConverter(pub DataType);

impl ValueConverter for IntegerConverter {
    fn data_type(&self) -> DataType {
        self.0
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        let i = json.as_i64().ok_or_else(|| mismatch(self.0, json))?;
        Ok(Value::Int(i).conform(self.0)?)
    }
}

/// Floating and decimal types. Decimal also accepts numeric text.
#[derive(Debug, Clone, Copy)]
pub struct FloatConverter(pub DataType);

impl ValueConverter for FloatConverter {
    fn data_type(&self) -> DataType {
        self.0
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        match json {
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(self.0, json)),
            JsonValue::String(s) if self.0 == DataType::Decimal => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(self.0, json)),
            _ => Err(mismatch(self.0, json)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StringConverter;

impl ValueConverter for StringConverter {
    fn data_type(&self) -> DataType {
        DataType::String
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        json.as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(|| mismatch(DataType::String, json))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DateTimeConverter;

impl ValueConverter for DateTimeConverter {
    fn data_type(&self) -> DataType {
        DataType::DateTime
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        json.as_str()
            .and_then(parse_datetime)
            .map(Value::DateTime)
            .ok_or_else(|| mismatch(DataType::DateTime, json))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GuidConverter;

impl ValueConverter for GuidConverter {
    fn data_type(&self) -> DataType {
        DataType::Guid
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        json.as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Guid)
            .ok_or_else(|| mismatch(DataType::Guid, json))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BinaryConverter;

impl ValueConverter for BinaryConverter {
    fn data_type(&self) -> DataType {
        DataType::Binary
    }

    fn parse(&self, json: &JsonValue) -> DataResult<Value> {
        json.as_str()
            .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
            .map(Value::Binary)
            .ok_or_else(|| mismatch(DataType::Binary, json))
    }
}

static BYTE: IntegerConverter = IntegerConverter(DataType::Byte);
static INT16: IntegerConverter = IntegerConverter(DataType::Int16);
static INT32: IntegerConverter = IntegerConverter(DataType::Int32);
static INT64: IntegerConverter = IntegerConverter(DataType::Int64);
static SINGLE: FloatConverter = FloatConverter(DataType::Single);
static DOUBLE: FloatConverter = FloatConverter(DataType::Double);
static DECIMAL: FloatConverter = FloatConverter(DataType::Decimal);

fn default_value_converter(data_type: DataType) -> &'static dyn ValueConverter {
    match data_type {
        DataType::Boolean => &BooleanConverter,
        DataType::Byte => &BYTE,
        DataType::Int16 => &INT16,
        DataType::Int32 => &INT32,
        DataType::Int64 => &INT64,
        DataType::Single => &SINGLE,
        DataType::Double => &DOUBLE,
        DataType::Decimal => &DECIMAL,
        DataType::String => &StringConverter,
        DataType::DateTime => &DateTimeConverter,
        DataType::Guid => &GuidConverter,
        DataType::Binary => &BinaryConverter,
    }
}

// --- Expressions ---

/// Converts one expression node kind. `to_json` returns the node's fields;
/// the registry adds the `"$type"` tag.
pub trait ExprConverter: Send + Sync {
    fn tag(&self) -> &'static str;

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>>;

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr>;
}

/// Registry and schema threaded through nested conversions.
#[derive(Clone, Copy)]
pub struct JsonContext<'a> {
    pub registry: &'a ConverterRegistry,
    pub schema: &'a Schema,
}

impl JsonContext<'_> {
    pub fn to_json(&self, expr: &Expr) -> DataResult<JsonValue> {
        self.registry.expr_to_json(expr, self.schema)
    }

    pub fn from_json(&self, json: &JsonValue) -> DataResult<Expr> {
        self.registry.expr_from_json(json, self.schema)
    }

    fn child(&self, object: &Map<String, JsonValue>, key: &str) -> DataResult<Expr> {
        self.from_json(field(object, key)?)
    }

    fn children(&self, object: &Map<String, JsonValue>, key: &str) -> DataResult<Vec<Expr>> {
        field(object, key)?
            .as_array()
            .ok_or_else(|| invalid(format!("'{}' must be an array", key)))?
            .iter()
            .map(|item| self.from_json(item))
            .collect()
    }
}

fn field<'j>(object: &'j Map<String, JsonValue>, key: &str) -> DataResult<&'j JsonValue> {
    object
        .get(key)
        .ok_or_else(|| invalid(format!("missing field '{}'", key)))
}

fn text_field<'j>(object: &'j Map<String, JsonValue>, key: &str) -> DataResult<&'j str> {
    field(object, key)?
        .as_str()
        .ok_or_else(|| invalid(format!("'{}' must be a string", key)))
}

fn typed_field<T: serde::de::DeserializeOwned>(
    object: &Map<String, JsonValue>,
    key: &str,
) -> DataResult<T> {
    Ok(serde_json::from_value(field(object, key)?.clone())?)
}

fn fields<const N: usize>(entries: [(&str, JsonValue); N]) -> Map<String, JsonValue> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn wrong_node(tag: &str, expr: &Expr) -> DataError {
    invalid(format!("{} converter cannot write {:?}", tag, expr))
}

/// `Constant` and `Parameter` nodes.
struct LiteralNodeConverter {
    parameter: bool,
}

impl ExprConverter for LiteralNodeConverter {
    fn tag(&self) -> &'static str {
        if self.parameter {
            "Parameter"
        } else {
            "Constant"
        }
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let (value, data_type) = match (expr, self.parameter) {
            (Expr::Constant { value, data_type }, false)
            | (Expr::Parameter { value, data_type }, true) => (value, *data_type),
            _ => return Err(wrong_node(self.tag(), expr)),
        };
        Ok(fields([
            ("dataType", serde_json::to_value(data_type)?),
            ("value", cx.registry.value_to_json(data_type, value)?),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let data_type: DataType = typed_field(object, "dataType")?;
        let value = match object.get("value") {
            Some(json) => cx.registry.value_from_json(data_type, json)?,
            None => Value::Null,
        };
        Ok(if self.parameter {
            Expr::Parameter { value, data_type }
        } else {
            Expr::Constant { value, data_type }
        })
    }
}

/// Column references by model and column name.
struct ColumnNodeConverter;

impl ExprConverter for ColumnNodeConverter {
    fn tag(&self) -> &'static str {
        "Column"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Column(column) = expr else {
            return Err(wrong_node(self.tag(), expr));
        };
        let model = cx
            .schema
            .models()
            .get(column.model.index())
            .ok_or_else(|| invalid(format!("column '{}' has an unknown model", column.name)))?;
        Ok(fields([
            ("model", JsonValue::String(model.name.clone())),
            ("name", JsonValue::String(column.name.clone())),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let column = cx
            .schema
            .column_ref(text_field(object, "model")?, text_field(object, "name")?)?;
        Ok(Expr::Column(column))
    }
}

struct UnaryNodeConverter;

impl ExprConverter for UnaryNodeConverter {
    fn tag(&self) -> &'static str {
        "Unary"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Unary { op, operand } = expr else {
            return Err(wrong_node(self.tag(), expr));
        };
        Ok(fields([
            ("op", serde_json::to_value(op)?),
            ("operand", cx.to_json(operand)?),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let op: UnaryOp = typed_field(object, "op")?;
        Ok(Expr::unary(op, cx.child(object, "operand")?))
    }
}

struct BinaryNodeConverter;

impl ExprConverter for BinaryNodeConverter {
    fn tag(&self) -> &'static str {
        "Binary"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Binary { op, left, right } = expr else {
            return Err(wrong_node(self.tag(), expr));
        };
        Ok(fields([
            ("op", serde_json::to_value(op)?),
            ("left", cx.to_json(left)?),
            ("right", cx.to_json(right)?),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let op: BinaryOp = typed_field(object, "op")?;
        Ok(Expr::binary(
            cx.child(object, "left")?,
            op,
            cx.child(object, "right")?,
        ))
    }
}

struct CastNodeConverter;

impl ExprConverter for CastNodeConverter {
    fn tag(&self) -> &'static str {
        "Cast"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Cast { operand, target } = expr else {
            return Err(wrong_node(self.tag(), expr));
        };
        Ok(fields([
            ("target", serde_json::to_value(target)?),
            ("operand", cx.to_json(operand)?),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let target: DataType = typed_field(object, "target")?;
        Ok(Expr::cast(cx.child(object, "operand")?, target))
    }
}

struct CaseNodeConverter;

impl ExprConverter for CaseNodeConverter {
    fn tag(&self) -> &'static str {
        "Case"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Case {
            on,
            when,
            otherwise,
        } = expr
        else {
            return Err(wrong_node(self.tag(), expr));
        };
        let branches = when
            .iter()
            .map(|(guard, then)| {
                Ok(JsonValue::Object(fields([
                    ("when", cx.to_json(guard)?),
                    ("then", cx.to_json(then)?),
                ])))
            })
            .collect::<DataResult<Vec<_>>>()?;
        let mut object = fields([
            ("when", JsonValue::Array(branches)),
            ("otherwise", cx.to_json(otherwise)?),
        ]);
        if let Some(on) = on {
            object.insert("on".to_string(), cx.to_json(on)?);
        }
        Ok(object)
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let branches = field(object, "when")?
            .as_array()
            .ok_or_else(|| invalid("'when' must be an array"))?;
        let mut when = Vec::with_capacity(branches.len());
        for branch in branches {
            let branch = branch
                .as_object()
                .ok_or_else(|| invalid("CASE branch must be an object"))?;
            when.push((cx.child(branch, "when")?, cx.child(branch, "then")?));
        }
        let otherwise = cx.child(object, "otherwise")?;
        Ok(match object.get("on") {
            Some(on) => Expr::case_on(cx.from_json(on)?, when, otherwise),
            None => Expr::case_when(when, otherwise),
        })
    }
}

struct FunctionNodeConverter;

impl ExprConverter for FunctionNodeConverter {
    fn tag(&self) -> &'static str {
        "Function"
    }

    fn to_json(&self, expr: &Expr, cx: &JsonContext<'_>) -> DataResult<Map<String, JsonValue>> {
        let Expr::Function { key, args } = expr else {
            return Err(wrong_node(self.tag(), expr));
        };
        let args = args
            .iter()
            .map(|arg| cx.to_json(arg))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(fields([
            ("name", JsonValue::String(key.name().to_string())),
            ("args", JsonValue::Array(args)),
        ]))
    }

    fn from_json(&self, object: &Map<String, JsonValue>, cx: &JsonContext<'_>) -> DataResult<Expr> {
        let name = text_field(object, "name")?;
        let key = FunctionKey::from_name(name)
            .ok_or_else(|| invalid(format!("unknown function '{}'", name)))?;
        let args = cx.children(object, "args")?;
        let (min, max) = key.arity();
        if args.len() < min || args.len() > max {
            return Err(invalid(format!(
                "{} takes {} to {} arguments, found {}",
                name,
                min,
                max,
                args.len()
            )));
        }
        Ok(Expr::function(key, args))
    }
}

fn expr_tag(expr: &Expr) -> &'static str {
    match expr {
        Expr::Constant { .. } => "Constant",
        Expr::Parameter { .. } => "Parameter",
        Expr::Column(_) => "Column",
        Expr::Unary { .. } => "Unary",
        Expr::Binary { .. } => "Binary",
        Expr::Cast { .. } => "Cast",
        Expr::Case { .. } => "Case",
        Expr::Function { .. } => "Function",
    }
}

/// Converters keyed by discriminator tag and by data type.
pub struct ConverterRegistry {
    expressions: HashMap<String, Box<dyn ExprConverter>>,
    values: HashMap<DataType, Box<dyn ValueConverter>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.expressions.keys().collect();
        tags.sort();
        f.debug_struct("ConverterRegistry")
            .field("expressions", &tags)
            .field("values", &self.values.len())
            .finish()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConverterRegistry {
    /// A registry with no converters.
    pub fn empty() -> Self {
        Self {
            expressions: HashMap::new(),
            values: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_expression(Box::new(LiteralNodeConverter { parameter: false }));
        registry.register_expression(Box::new(LiteralNodeConverter { parameter: true }));
        registry.register_expression(Box::new(ColumnNodeConverter));
        registry.register_expression(Box::new(UnaryNodeConverter));
        registry.register_expression(Box::new(BinaryNodeConverter));
        registry.register_expression(Box::new(CastNodeConverter));
        registry.register_expression(Box::new(CaseNodeConverter));
        registry.register_expression(Box::new(FunctionNodeConverter));
        registry.register_value(Box::new(BooleanConverter));
        for data_type in [DataType::Byte, DataType::Int16, DataType::Int32, DataType::Int64] {
            registry.register_value(Box::new(IntegerConverter(data_type)));
        }
        for data_type in [DataType::Single, DataType::Double, DataType::Decimal] {
            registry.register_value(Box::new(FloatConverter(data_type)));
        }
        registry.register_value(Box::new(StringConverter));
        registry.register_value(Box::new(DateTimeConverter));
        registry.register_value(Box::new(GuidConverter));
        registry.register_value(Box::new(BinaryConverter));
        registry
    }

    /// Register a converter, replacing any with the same tag.
    pub fn register_expression(&mut self, converter: Box<dyn ExprConverter>) {
        self.expressions.insert(converter.tag().to_string(), converter);
    }

    pub fn register_value(&mut self, converter: Box<dyn ValueConverter>) {
        self.values.insert(converter.data_type(), converter);
    }

    pub fn expression_converter(&self, tag: &str) -> Option<&dyn ExprConverter> {
        self.expressions.get(tag).map(|c| c.as_ref())
    }

    pub fn value_converter(&self, data_type: DataType) -> Option<&dyn ValueConverter> {
        self.values.get(&data_type).map(|c| c.as_ref())
    }

    fn resolve_expression(&self, tag: &str) -> DataResult<&dyn ExprConverter> {
        self.expression_converter(tag)
            .ok_or_else(|| invalid(format!("no converter registered for '{}'", tag)))
    }

    fn resolve_value(&self, data_type: DataType) -> DataResult<&dyn ValueConverter> {
        self.value_converter(data_type)
            .ok_or_else(|| invalid(format!("no converter registered for {}", data_type)))
    }

    pub fn value_to_json(&self, data_type: DataType, value: &Value) -> DataResult<JsonValue> {
        self.resolve_value(data_type)?.to_json(value)
    }

    pub fn value_from_json(&self, data_type: DataType, json: &JsonValue) -> DataResult<Value> {
        self.resolve_value(data_type)?.from_json(json)
    }

    pub fn expr_to_json(&self, expr: &Expr, schema: &Schema) -> DataResult<JsonValue> {
        let tag = expr_tag(expr);
        let cx = JsonContext {
            registry: self,
            schema,
        };
        let mut object = Map::new();
        object.insert(TYPE_TAG.to_string(), JsonValue::String(tag.to_string()));
        object.extend(self.resolve_expression(tag)?.to_json(expr, &cx)?);
        Ok(JsonValue::Object(object))
    }

    pub fn expr_from_json(&self, json: &JsonValue, schema: &Schema) -> DataResult<Expr> {
        let object = json
            .as_object()
            .ok_or_else(|| invalid("expression must be an object"))?;
        let tag = text_field(object, TYPE_TAG)?;
        let cx = JsonContext {
            registry: self,
            schema,
        };
        self.resolve_expression(tag)?.from_json(object, &cx)
    }
}
