//! Arithmetic tools: `add`, `subtract`, `multiply` and `divide`.

use crate::capabilities::handler::{CapabilityError, ToolHandler};
use abacus_types::{CallToolResult, Content, Tool};
use serde_json::{json, Map, Value};

/// The binary operation performed by an [`ArithmeticTool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Operation::Add => "Adds two numbers",
            Operation::Subtract => "Subtracts the second number from the first",
            Operation::Multiply => "Multiplies two numbers",
            Operation::Divide => "Divides the first number by the second",
        }
    }
}

/// Tool taking `{a: number, b: number}` and returning the result as text.
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticTool {
    pub operation: Operation,
}

impl ArithmeticTool {
    pub fn definition(&self) -> Tool {
        Tool {
            name: self.operation.name().to_string(),
            description: Some(self.operation.description().to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number" }
                },
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        }
    }

    fn number_arg(&self, arguments: &Map<String, Value>, key: &str) -> Result<f64, CapabilityError> {
        arguments
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| CapabilityError::InvalidArguments {
                name: self.operation.name().to_string(),
                reason: format!("'{}' must be a number", key),
            })
    }
}

impl ToolHandler for ArithmeticTool {
    fn call(&self, arguments: &Map<String, Value>) -> Result<CallToolResult, CapabilityError> {
        let a = self.number_arg(arguments, "a")?;
        let b = self.number_arg(arguments, "b")?;

        let value = match self.operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide => {
                if b == 0.0 {
                    return Ok(CallToolResult::error(vec![Content::text(
                        "Error: Division by zero",
                    )]));
                }
                a / b
            }
        };

        Ok(CallToolResult::success(vec![Content::text(format_number(
            value,
        ))]))
    }
}

/// Get all arithmetic tools with their definitions.
pub fn get_tools() -> Vec<(Tool, ArithmeticTool)> {
    [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ]
    .into_iter()
    .map(|operation| {
        let tool = ArithmeticTool { operation };
        (tool.definition(), tool)
    })
    .collect()
}

/// Format a number the way clients expect to read it back: integral values
/// without a fractional part, very large or small magnitudes in exponent form,
/// `Infinity`/`NaN` spelled out.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() < 1e-6 || value.abs() >= 1e21 {
        exponential(value)
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Shortest round-trip digits in exponent form, with an explicit `+` on
/// non-negative exponents (`1e+21`, `1e-7`).
fn exponential(value: f64) -> String {
    let formatted = format!("{:e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(operation: Operation, a: Value, b: Value) -> Result<CallToolResult, CapabilityError> {
        let mut args = Map::new();
        args.insert("a".to_string(), a);
        args.insert("b".to_string(), b);
        ArithmeticTool { operation }.call(&args)
    }

    fn text(result: &CallToolResult) -> &str {
        result.content[0].as_text().unwrap()
    }

    #[test]
    fn test_add() {
        let result = call(Operation::Add, json!(2), json!(3)).unwrap();
        assert!(!result.is_error);
        assert_eq!(text(&result), "5");
    }

    #[test]
    fn test_subtract_and_multiply() {
        let result = call(Operation::Subtract, json!(2), json!(3.5)).unwrap();
        assert_eq!(text(&result), "-1.5");

        let result = call(Operation::Multiply, json!(0.5), json!(4)).unwrap();
        assert_eq!(text(&result), "2");
    }

    #[test]
    fn test_divide() {
        let result = call(Operation::Divide, json!(10), json!(2)).unwrap();
        assert!(!result.is_error);
        assert_eq!(text(&result), "5");

        let result = call(Operation::Divide, json!(1), json!(4)).unwrap();
        assert_eq!(text(&result), "0.25");
    }

    #[test]
    fn test_divide_by_zero_is_flagged_result() {
        let result = call(Operation::Divide, json!(10), json!(0)).unwrap();
        assert!(result.is_error);
        assert_eq!(text(&result), "Error: Division by zero");
    }

    #[test]
    fn test_rejects_non_numeric_arguments() {
        let err = call(Operation::Add, json!("2"), json!(3)).unwrap_err();
        assert_eq!(
            err,
            CapabilityError::InvalidArguments {
                name: "add".to_string(),
                reason: "'a' must be a number".to_string(),
            }
        );

        let err = ArithmeticTool {
            operation: Operation::Multiply,
        }
        .call(&Map::new())
        .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments { .. }));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-1.5e300), "-1.5e+300");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(2.5e-10), "2.5e-10");
        assert_eq!(format_number(0.000001), "0.000001");
    }
}
