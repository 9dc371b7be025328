//! Prompt texts sent to the chat and vision models.

pub const ROUTER_SYSTEM_PROMPT: &str = "You are the central processor of an SRE assistant and decide \
which tool to call next. Based on the user's query, pick exactly one of the tools provided to you. \
Each tool may be used at most once while answering a query.\n\n\
Try to gather enough information from every relevant tool before answering. Once the scratchpad \
holds the relevant information from the tools, or every tool has been searched without finding \
anything relevant, call the final_answer tool to produce the answer.";

pub const QUERY_TRANSLATION_PROMPT: &str = "You are an AI assistant. Write five different versions of \
the query below, to be used for retrieving relevant documents from a vector database. Looking at \
the query from several perspectives helps work around the limits of distance-based similarity \
search. Put each alternative query on its own line and output nothing else.\n\
Original query: {query}";

pub const FINAL_ANSWER_PROMPT: &str = "You are an assistant that summarizes the information an SRE \
needs from the retrieved context below.\n\
- For engineering documents, summarize the relevant information.\n\
- For incident analysis documents, the answer must include the incident title, the incident \
description and the root cause analysis.\n\
- For code change history, summarize the key changes around the incident start time.\n\
- For application monitoring data, summarize the relevant signals.\n\
Start every piece of information with its data source label, for example:\n\
Data source: incident analysis documents\n\
Incident title: Mismatched data type caused some GraphQL queries to be rejected\n\
Incident description: KPI results were missing from several reports in the UI.\n\
Root cause analysis: A reporting change produced NaN KPI values that did not match the GraphQL \
schema, so the affected queries were rejected.\n\n\
If the context does not contain enough information, say that no relevant information could be \
found. Keep the answer brief, under 500 words.\n\
Query: {query}\n\
Context: {context}\n\
Answer:";

pub const INCIDENT_EXTRACTION_PROMPT: &str = "You summarize incident information from an incident \
analysis PDF document provided as page images. The summary must include the incident title, the \
incident description and the root cause analysis, in this format:\n\
Data source: incident analysis documents\n\
Incident title: <title>\n\
Incident description: <description>\n\
Root cause analysis: <root cause>";

pub const INCIDENT_SUMMARY_PROMPT: &str = "You summarize an incident analysis document, provided as \
page images, for retrieval. The summary is embedded and used to find the original document later. \
Give a concise summary with only the incident title and the incident description; do not include \
the root cause analysis. Example:\n\
Title: Mismatched data type caused some GraphQL queries to be rejected\n\
Incident description: KPI results were missing from several reports in the UI.";

/// Fill `{name}` placeholders in a prompt template in a single pass.
///
/// Substituted values are never rescanned, so user text containing `{context}`
/// stays literal. Unknown placeholders are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_every_placeholder() {
        let out = render(FINAL_ANSWER_PROMPT, &[("query", "Q?"), ("context", "CTX")]);
        assert!(out.contains("Query: Q?"));
        assert!(out.contains("Context: CTX"));
        assert!(!out.contains("{query}"));
    }

    #[test]
    fn render_keeps_placeholders_inside_values_literal() {
        let out = render(
            FINAL_ANSWER_PROMPT,
            &[("query", "why is {context} empty?"), ("context", "CTX")],
        );
        assert!(out.contains("Query: why is {context} empty?"));
        assert!(out.contains("Context: CTX"));
        assert_eq!(render("{a}{b}", &[("a", "{b}"), ("b", "x")]), "{b}x");
        assert_eq!(render("{unknown} {", &[("a", "1")]), "{unknown} {");
    }
}
