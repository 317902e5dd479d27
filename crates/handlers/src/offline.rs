use async_trait::async_trait;
use consulta_dispatch::{Handler, HandlerContext, HandlerError};

/// Local stand-in used when no remote endpoint is configured. Answers with
/// what the classifier understood about the query.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineHandler;

#[async_trait]
impl Handler for OfflineHandler {
    fn name(&self) -> &str {
        "offline"
    }

    async fn invoke(&self, query: &str, ctx: HandlerContext) -> Result<String, HandlerError> {
        let classification = &ctx.classification;
        Ok(format!(
            "[offline] {query}\nintent: {} (confidence {:.2})\nentities: {}\nkeywords: {}\n\
             Configure CONSULTA_API_TOKEN to get full answers.",
            ctx.intent,
            classification.confidence,
            join_or_dash(&classification.entities),
            join_or_dash(&classification.keywords),
        ))
    }
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}
