//! `math-problem` prompt template.

use crate::capabilities::handler::{CapabilityError, PromptRenderer};
use abacus_types::{Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Role};
use std::collections::HashMap;

pub fn prompt() -> Prompt {
    Prompt {
        name: "math-problem".to_string(),
        description: Some("Prompt template for solving math problems".to_string()),
        arguments: vec![PromptArgument {
            name: "problem".to_string(),
            description: None,
            required: true,
        }],
    }
}

pub struct MathProblem;

impl PromptRenderer for MathProblem {
    fn render(
        &self,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, CapabilityError> {
        let problem =
            arguments
                .get("problem")
                .ok_or_else(|| CapabilityError::InvalidArguments {
                    name: "math-problem".to_string(),
                    reason: "missing required argument 'problem'".to_string(),
                })?;

        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(format!("Please solve this math problem: {}", problem)),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_math_problem() {
        let mut args = HashMap::new();
        args.insert("problem".to_string(), "2 + 2".to_string());
        let result = MathProblem.render(&args).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(
            result.messages[0].content.as_text(),
            Some("Please solve this math problem: 2 + 2")
        );
    }
}
