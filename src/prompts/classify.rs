use crate::item::{CategorySet, Item};
use crate::tools::ToolSpec;

const ROLE: &str = "You are a helpful assistant that helps the user organise information in a way that aids the user's learning of information.";
const TOOLS_HEADER: &str = "Only use the tools if you are unable to categorise the message content with the existing information. These are the tools available to you:";
const INSTRUCTIONS_HEADER: &str = "You are given a JSON object representing saved content. Your task is to:";
const TASKS: &[&str] = &[
    "Determine the category of the content (e.g. \"To-Do List\", \"LLM\", \"Tutorial\").",
    "Write a concise summary of the content.",
    "Explain briefly why you chose the category.",
];
const RULES: &[&str] = &[
    "Use the values from fields like details, title and description to complete your task.",
    "If the fields are missing, empty, or not informative enough, use the tools as needed.",
    "Prefer one of the existing categories when it fits. Create a new one only when none does.",
    "If the tools do not help, or content remains empty, answer with Category: \"Uncategorised\" and Summary: \"No content to summarise\".",
];
const EXAMPLE: &str = r#"Input:
{"date_saved": "2023-10-01T12:00:00+08:00", "date_detail": "2023-10-01T12:00:00+08:00", "details": "https://www.example.com", "title": "Building LLM from scratch", "description": "Step by step guide to build LLM"}
Output:
Category: LLM
Summary: An article about building LLM from scratch.
Reasoning: The title and description describe building a large language model."#;

/// Instruction for the constrained extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "Extract the category, summary and reasoning from the analysis below. \
Copy the category label as written; do not invent a new one.";

pub fn build_classify_system_prompt(tools: &[ToolSpec]) -> String {
    let tools_desc = tools
        .iter()
        .enumerate()
        .map(|(i, tool)| format!("{}. {}: {}", i + 1, tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n");

    let tasks = TASKS
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {}", i + 1, task))
        .collect::<Vec<_>>()
        .join("\n");

    let rules = RULES
        .iter()
        .map(|rule| format!("- {}", rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<Role>\n{ROLE}\n</Role>\n\n<Tools>\n{TOOLS_HEADER}\n\n{tools_desc}\n</Tools>\n\n<Instructions>\n{INSTRUCTIONS_HEADER}\n\n{tasks}\n\n{rules}\n</Instructions>\n\n<Example>\n{EXAMPLE}\n</Example>\n"
    )
}

pub fn build_classify_user_prompt(item: &Item, categories: &CategorySet) -> String {
    let existing = if categories.is_empty() {
        "(none yet)".to_string()
    } else {
        categories.to_string()
    };
    format!(
        "Please summarise and categorise the below message content.\n\nInput: {}\n\nExisting categories: {}",
        item.to_prompt_json(),
        existing
    )
}
