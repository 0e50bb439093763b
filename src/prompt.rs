//! Prompt composition.
//!
//! Turns a [`RequestContext`] into the system instruction and user message
//! sent to the service. Composition is a pure lookup into a static template
//! table keyed by [`RequestMode`], so every mode is built the same way.
//!
//! # Example
//!
//! ```rust
//! use promptline::prompt::{compose, RequestContext, RequestMode};
//!
//! let context = RequestContext::new(RequestMode::Primary, "Senior Backend Engineer");
//! let prompt = compose(&context);
//!
//! assert!(prompt.user_message.contains("Senior Backend Engineer"));
//! assert_eq!(prompt, compose(&context));
//! ```

use serde::{Deserialize, Serialize};

/// Which template applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Job description for a role title.
    Primary,
    /// Stack, team and timeline recommendation for a project.
    Secondary,
}

impl RequestMode {
    /// All modes, in template table order.
    pub const ALL: [RequestMode; 2] = [RequestMode::Primary, RequestMode::Secondary];

    /// The static template for this mode.
    pub fn template(self) -> &'static PromptTemplate {
        &TEMPLATES[self as usize]
    }
}

/// Caller input for one submission. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestContext {
    mode: RequestMode,
    raw_input: String,
}

impl RequestContext {
    /// Create a context. Emptiness is checked by the orchestrator, not here.
    pub fn new(mode: RequestMode, raw_input: impl Into<String>) -> Self {
        Self {
            mode,
            raw_input: raw_input.into(),
        }
    }

    /// The selected mode.
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// The input exactly as the caller supplied it.
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    /// Returns true if the input is empty after trimming whitespace.
    pub fn is_blank(&self) -> bool {
        self.raw_input.trim().is_empty()
    }
}

/// The prompt pair sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComposedPrompt {
    /// Instruction establishing the model's role and output shape.
    pub system_instruction: String,
    /// The user turn embedding the caller's input.
    pub user_message: String,
}

/// One row of the template table.
#[derive(Debug)]
pub struct PromptTemplate {
    /// Full system instruction text.
    pub system_instruction: &'static str,
    /// Text placed before the caller's input in the user message.
    pub input_prefix: &'static str,
    /// Text placed after the caller's input in the user message.
    pub input_suffix: &'static str,
}

impl PromptTemplate {
    fn render(&self, input: &str) -> ComposedPrompt {
        let mut user_message =
            String::with_capacity(self.input_prefix.len() + input.len() + self.input_suffix.len());
        user_message.push_str(self.input_prefix);
        user_message.push_str(input);
        user_message.push_str(self.input_suffix);
        ComposedPrompt {
            system_instruction: self.system_instruction.to_owned(),
            user_message,
        }
    }
}

// Indexed by `RequestMode as usize`.
static TEMPLATES: [PromptTemplate; 2] = [
    PromptTemplate {
        system_instruction: "You are an expert recruiting copywriter. Write a structured, \
            compelling job description with the sections: Role Overview, Responsibilities, \
            Required Skills, Nice to Have, and What We Offer. Use concise bullet points.",
        input_prefix: "Write a job description for the role: ",
        input_suffix: "",
    },
    PromptTemplate {
        system_instruction: "You are a senior technical architect. Recommend a technology \
            stack, an ideal team composition with roles and headcount, and a phased delivery \
            timeline. Justify each choice briefly.",
        input_prefix: "Project description: ",
        input_suffix: "\nRecommend the stack, team, and timeline for this project.",
    },
];

/// Compose the prompt for a context. Pure and deterministic.
pub fn compose(context: &RequestContext) -> ComposedPrompt {
    context.mode.template().render(context.raw_input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn table_rows_line_up_with_modes() {
        assert!(RequestMode::Primary
            .template()
            .system_instruction
            .contains("recruiting copywriter"));
        assert!(RequestMode::Secondary
            .template()
            .system_instruction
            .contains("technical architect"));
    }

    #[test]
    fn primary_embeds_role_title() {
        let prompt = compose(&RequestContext::new(
            RequestMode::Primary,
            "Senior Backend Engineer",
        ));
        assert_eq!(
            prompt.user_message,
            "Write a job description for the role: Senior Backend Engineer"
        );
        assert!(prompt.system_instruction.contains("job description"));
    }

    #[test]
    fn secondary_embeds_project_description() {
        let prompt = compose(&RequestContext::new(
            RequestMode::Secondary,
            "  A marketplace for used bikes  ",
        ));
        assert!(prompt
            .user_message
            .starts_with("Project description: A marketplace for used bikes\n"));
        assert!(prompt.system_instruction.contains("timeline"));
    }

    #[test]
    fn blank_detection_trims_whitespace() {
        assert!(RequestContext::new(RequestMode::Primary, " \t\n").is_blank());
        assert!(!RequestContext::new(RequestMode::Primary, " x ").is_blank());
    }

    fn any_mode() -> impl Strategy<Value = RequestMode> {
        prop_oneof![Just(RequestMode::Primary), Just(RequestMode::Secondary)]
    }

    proptest! {
        #[test]
        fn prop_compose_is_deterministic(mode in any_mode(), input in "\\PC{1,64}") {
            let context = RequestContext::new(mode, input);
            prop_assert_eq!(compose(&context), compose(&context.clone()));
        }

        #[test]
        fn prop_user_message_contains_trimmed_input(
            mode in any_mode(),
            input in "[a-zA-Z0-9 ]{1,40}"
        ) {
            let context = RequestContext::new(mode, input.clone());
            let prompt = compose(&context);
            prop_assert!(prompt.user_message.contains(input.trim()));
            prop_assert_eq!(prompt.system_instruction, mode.template().system_instruction);
        }
    }
}
