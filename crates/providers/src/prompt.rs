/// Grounded-answer prompt: the model may only use the supplied code context.
pub fn build_prompt(context: &str, question: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no code context was retrieved)"
    } else {
        context.trim()
    };

    format!(
        "You are a senior code analyst.\n\
         \n\
         Answer ONLY from the code provided below.\n\
         Do not assume behaviour outside this code.\n\
         Do not generalize.\n\
         If something is not explicit in the code, say that it cannot be determined.\n\
         \n\
         ### CODE CONTEXT\n\
         {context}\n\
         \n\
         ### QUESTION\n\
         {question}\n\
         \n\
         ### ANSWER",
        question = question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::build_prompt;

    #[test]
    fn prompt_orders_context_before_question() {
        let prompt = build_prompt("def run(): pass\n", "What does run do?");
        let context_at = prompt.find("### CODE CONTEXT\ndef run(): pass").unwrap();
        let question_at = prompt.find("### QUESTION\nWhat does run do?").unwrap();
        assert!(context_at < question_at);
        assert!(prompt.ends_with("### ANSWER"));
        assert!(prompt.contains("ONLY from the code"));
    }

    #[test]
    fn empty_context_is_stated_explicitly() {
        let prompt = build_prompt("   ", "who calls main?");
        assert!(prompt.contains("(no code context was retrieved)"));
    }
}
