//! Research prompts
//!
//! Every completion call shares [`system_prompt`]; the user prompts below
//! carry the task-specific instructions.

use chrono::Utc;

/// Expert-researcher system prompt stamped with the current UTC time
pub fn system_prompt() -> String {
    format!(
        r#"You are an expert researcher. Today is {}. Follow these instructions when responding:
- You may be asked to research subjects that are after your knowledge cutoff, assume the user is right when presented with news.
- The user is a highly experienced analyst, no need to simplify it, be as detailed as possible and make sure your response is correct.
- Be highly organized.
- Suggest solutions that I didn't think about.
- Be proactive and anticipate my needs.
- Treat me as an expert in all subject matter.
- Mistakes erode my trust, so be accurate and thorough.
- Provide detailed explanations, I'm comfortable with lots of detail.
- Value good arguments over authorities, the source is irrelevant.
- Consider new technologies and contrarian ideas, not just the conventional wisdom.
- You may use high levels of speculation or prediction, just flag it for me."#,
        Utc::now().to_rfc3339()
    )
}

pub fn feedback_prompt(topic: &str, count: usize) -> String {
    format!(
        "Given the following query from the user, ask some follow up questions to clarify the research direction. \
Return a maximum of {} questions, but feel free to return less if the original query is clear: <query>{}</query>",
        count, topic
    )
}

pub fn serp_queries_prompt(topic: &str, max_queries: usize, prior_learnings: &[String]) -> String {
    let learnings_section = if prior_learnings.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nHere are some learnings from previous research, use them to generate more specific queries: {}",
            prior_learnings.join("\n")
        )
    };

    format!(
        "Given the following prompt from the user, generate a list of SERP queries to research the topic. \
Return a maximum of {} queries, but feel free to return less if the original prompt is clear. \
Make sure each query is unique and not similar to each other: <prompt>{}</prompt>{}",
        max_queries, topic, learnings_section
    )
}

pub fn extraction_prompt(query: &str, contents: &[String], max_learnings: usize) -> String {
    let contents_section = contents
        .iter()
        .map(|content| format!("<content>\n{}\n</content>", content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following contents from a SERP search for the query <query>{}</query>, generate a list of learnings from the contents. \
Return a maximum of {} learnings, but feel free to return less if the contents are clear. \
Make sure each learning is unique and not similar to each other. \
The learnings should be concise and to the point, as detailed and information dense as possible. \
Make sure to include any entities like people, places, companies, products, things, etc in the learnings, as well as any exact metrics, numbers, or dates. \
The learnings will be used to research the topic further.\n\n<contents>{}</contents>",
        query, max_learnings, contents_section
    )
}

/// Wrap each learning in tags for the report writer
pub fn learnings_block(learnings: &[String]) -> String {
    learnings
        .iter()
        .map(|learning| format!("<learning>\n{}\n</learning>", learning))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn report_prompt(topic: &str, learnings_block: &str) -> String {
    format!(
        "Given the following prompt from the user, write a final report on the topic using the learnings from research and format it in proper Markdown. \
Use Markdown syntax (headings, lists, horizontal rules, etc.) to structure the document. Aim for a detailed report of at least 3 pages.\n\n\
<prompt>{}</prompt>\n\nHere are all the learnings from previous research:\n\n<learnings>\n{}\n</learnings>",
        topic, learnings_block
    )
}

/// Topic for a deeper level: the original topic plus the directions the previous level suggested
pub fn deeper_level_topic(topic: &str, directions: &[String]) -> String {
    if directions.is_empty() {
        return topic.to_string();
    }

    format!(
        "{}\n\nFollow-up research directions:\n{}",
        topic,
        directions
            .iter()
            .map(|d| format!("- {}", d))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_prompt_mentions_prior_learnings_only_when_present() {
        let fresh = serp_queries_prompt("rates and startups", 3, &[]);
        assert!(fresh.contains("maximum of 3 queries"));
        assert!(!fresh.contains("learnings from previous research"));

        let seeded = serp_queries_prompt("rates and startups", 2, &["Seed fell 30%".to_string()]);
        assert!(seeded.contains("Seed fell 30%"));
    }

    #[test]
    fn learnings_are_tagged() {
        let block = learnings_block(&["a".to_string(), "b".to_string()]);
        assert_eq!(block, "<learning>\na\n</learning>\n<learning>\nb\n</learning>");
    }

    #[test]
    fn deeper_topic_lists_directions() {
        assert_eq!(deeper_level_topic("topic", &[]), "topic");
        let topic = deeper_level_topic("topic", &["Why?".to_string()]);
        assert!(topic.ends_with("Follow-up research directions:\n- Why?"));
    }
}
