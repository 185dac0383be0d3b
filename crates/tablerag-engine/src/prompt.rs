//! Plain-text rendering of retrieved contexts for a downstream generator.

use crate::types::QueryResult;

impl QueryResult {
    /// One numbered block per hit: the row's non-null cells as
    /// `column: value` lines, then the values it links to.
    pub fn to_prompt_context(&self) -> String {
        if self.relevant_contexts.is_empty() {
            return String::new();
        }

        self.relevant_contexts
            .iter()
            .enumerate()
            .map(|(i, ctx)| {
                let mut block = format!("[{}] {} (distance: {:.4})", i + 1, ctx.id, ctx.score);
                for (column, value) in &ctx.node.attributes {
                    if !value.is_null() {
                        block.push_str(&format!("\n{}: {}", column, value));
                    }
                }
                if !ctx.neighbors.is_empty() {
                    let related: Vec<String> = ctx.neighbors.iter().map(|n| n.label()).collect();
                    block.push_str(&format!("\nRelated: {}", related.join("; ")));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
