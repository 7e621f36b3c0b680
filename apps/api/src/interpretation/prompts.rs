// Prompt template for turning free text into a structured interpretation.
// The template is compiled into the binary and checked once at startup.

use anyhow::{bail, Result};

const INPUT_PLACEHOLDER: &str = "{input}";

/// Interpretation prompt. `{input}` is replaced with the user's text.
pub const INTERPRETATION_PROMPT_TEMPLATE: &str = r#"You turn a short note written by a user into a single actionable item.

Return ONLY a JSON object with this EXACT schema:
{
  "type": "todo",
  "title": "short imperative title",
  "description": "optional longer description",
  "metadata": {
    "deadline": "RFC3339 timestamp, only if the note implies one",
    "priority": "low | medium | high",
    "tags": ["lowercase", "keywords"]
  }
}

Rules:
- "type" is always "todo".
- "title" is required and must not be empty.
- Omit "description", "deadline" and "priority" when the note gives no basis for them.
- Resolve relative dates ("tomorrow", "next monday") against the current date and
  write them as full RFC3339 timestamps with an offset.
- Do NOT include any text outside the JSON object.
- Do NOT use markdown code fences.

User note:
{input}
"#;

/// A validated template split around its single `{input}` placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    head: String,
    tail: String,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut pieces = template.split(INPUT_PLACEHOLDER);
        let (Some(head), Some(tail), None) = (pieces.next(), pieces.next(), pieces.next()) else {
            bail!("prompt template must contain exactly one {INPUT_PLACEHOLDER} placeholder");
        };
        if head.trim().is_empty() {
            bail!("prompt template has no instructions before {INPUT_PLACEHOLDER}");
        }

        Ok(Self {
            head: head.to_string(),
            tail: tail.to_string(),
        })
    }

    pub fn interpretation() -> Result<Self> {
        Self::parse(INTERPRETATION_PROMPT_TEMPLATE)
    }

    pub fn render(&self, input: &str) -> String {
        let mut prompt = String::with_capacity(self.head.len() + input.len() + self.tail.len());
        prompt.push_str(&self.head);
        prompt.push_str(input);
        prompt.push_str(&self.tail);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_template_is_valid() {
        let template = PromptTemplate::interpretation().unwrap();
        let prompt = template.render("Buy milk tomorrow");
        assert!(prompt.contains("User note:\nBuy milk tomorrow\n"));
        assert!(!prompt.contains(INPUT_PLACEHOLDER));
    }

    #[test]
    fn test_input_is_inserted_verbatim() {
        let template = PromptTemplate::parse("Note: {input}.").unwrap();
        assert_eq!(template.render("{input} {}"), "Note: {input} {}.");
    }

    #[test]
    fn test_parse_rejects_missing_or_repeated_placeholder() {
        assert!(PromptTemplate::parse("no placeholder").is_err());
        assert!(PromptTemplate::parse("a {input} b {input}").is_err());
        assert!(PromptTemplate::parse("{input}").is_err());
    }
}
