//! Instruction prompt, user prompt layout, and the report question battery.

use super::context::RetrievalContext;
use crate::types::ProductRef;

pub(crate) const SYSTEM_PROMPT: &str = "\
You are a senior product analyst. You receive a question about one product and \
a set of user feedback items retrieved for it as 'Context'.

Rules:
1. Answer only from the Context. If it does not contain the answer, say so plainly.
2. Ignore meta-commentary about where the feedback came from or the medium it was \
posted on (channels, videos, threads, search pages); analyse what users say about the product.
3. Answer only the specific question asked. Do not add unrelated sections.

Each Context line is prefixed with a pre-computed sentiment label such as [POSITIVE], \
[NEGATIVE] or [NEUTRAL], and sometimes a star rating. Use the labels and the statistics \
block to describe the overall sentiment. Where pros and cons are relevant, group them \
under \"## Pros\" and \"## Cons\" headings as bullet points, each backed by one or two \
short quotes from the Context. Respond in Markdown.";

/// `(section title, canned question)` pairs run by the report, in order.
pub(crate) const REPORT_SECTIONS: [(&str, &str); 4] = [
    (
        "Overall Summary",
        "Give an overall summary of what users think about this product, including the general sentiment.",
    ),
    (
        "Pros",
        "What do users like most about this product? List the main positive themes.",
    ),
    (
        "Cons",
        "What do users dislike or complain about in this product? List the main negative themes.",
    ),
    (
        "Feature Requests",
        "What features, fixes or improvements are users asking for?",
    ),
];

pub(crate) fn user_prompt(question: &str, product: &ProductRef, context: &RetrievalContext) -> String {
    format!(
        "**Product:** {name} (id {id})\n\n\
         **Question:**\n{question}\n\n\
         **Context:**\n---\n{lines}\n---\n\n\
         **Statistics:**\n{stats}\n",
        name = product.name,
        id = product.id,
        lines = context.text(),
        stats = context.statistics(),
    )
}
