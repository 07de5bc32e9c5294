// Prompt templates for the definition and article calls.

use crate::topics::RelatedLink;

pub const SYSTEM_MESSAGE: &str = "You are an AI language model. Your task is to follow the provided outline \
and ensure that the content is well-structured, SEO-friendly, and addresses the key points in each section. \
Make sure to use clear, concise language and provide practical advice, examples, and tips where applicable.";

pub fn definition_prompt(topic: &str) -> String {
    format!("Please provide a short, clear and concise definition for the marketing term '{topic}'.")
}

/// Paragraph asking the model to weave in related links; `None` when there
/// are none, so the article prompt omits it entirely.
pub fn related_links_prompt(links: &[RelatedLink]) -> Option<String> {
    if links.is_empty() {
        return None;
    }
    let listed = links
        .iter()
        .map(|l| format!("{} ({})", l.topic, l.full_path))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "In your HTML output, incorporate the following related links into the article text by using \
relevant anchor text when applicable. If a link is not directly relevant to the text, include it in the \
'related terms' section. Here are the related links to incorporate:\n\n{listed}."
    ))
}

pub fn article_prompt(topic: &str, sections: &[String], links: &[RelatedLink]) -> String {
    let mut prompt = format!(
        "Please write an informative article about the marketing term '{topic}' following the given outline:\n\n{}\n\n\
Please provide the output in semantic HTML format (there is no need for the H1).",
        sections.join("\n")
    );
    if let Some(related) = related_links_prompt(links) {
        prompt.push_str("\n\n");
        prompt.push_str(&related);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_prompt_lists_outline_and_links() {
        let links = vec![
            RelatedLink {
                topic: "SERP".to_string(),
                full_path: "https://e.com/serp".to_string(),
            },
            RelatedLink {
                topic: "Backlinks".to_string(),
                full_path: "https://e.com/backlinks".to_string(),
            },
        ];
        let prompt = article_prompt("SEO", &["Intro".to_string(), "Tips".to_string()], &links);
        assert!(prompt.contains("'SEO'"));
        assert!(prompt.contains("Intro\nTips"));
        assert!(prompt.contains("SERP (https://e.com/serp), Backlinks (https://e.com/backlinks)."));
    }

    #[test]
    fn empty_links_are_omitted() {
        let prompt = article_prompt("SEO", &[], &[]);
        assert!(!prompt.contains("related links"));
        assert!(prompt.ends_with("(there is no need for the H1)."));
    }

    #[test]
    fn definition_prompt_names_topic() {
        assert!(definition_prompt("PPC").contains("'PPC'"));
    }
}
