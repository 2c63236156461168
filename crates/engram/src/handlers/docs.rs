//! Embedded usage documentation served by the `how_to_use` tool

use crate::handlers::common::yaml_result;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct HowToUseParams {
    #[schemars(description = "One of: facts, vectors, graph, documents, events, code, watcher")]
    pub topic: Option<String>,
}

const TOPICS: &[(&str, &str)] = &[
    (
        "facts",
        "Key-value facts scoped per user or project.\n\
         - save_fact(user_id, key, value): create or overwrite; value may be any JSON type\n\
         - get_fact / update_fact / delete_fact: read, strict update, delete\n\
         - list_facts(user_id): every fact in the scope\n\
         When a scope has no rows the response carries an `alternatives` list of known scopes.",
    ),
    (
        "vectors",
        "Vector memories: free text with server-generated embeddings.\n\
         - index_vector(user_id, content, metadata?): returns the new id\n\
         - search_vectors(user_id, query, limit?): cosine-ranked semantic recall\n\
         - update_vector(id, content?, metadata?): new content re-embeds\n\
         - delete_vector(id)",
    ),
    (
        "graph",
        "Typed entities and relationships.\n\
         - create_entity(entity_type, name, properties?)\n\
         - create_relationship(from_entity, to_entity, relationship_type, properties?):\n\
           endpoints resolve by record id first, then by entity name\n\
         - traverse_graph(start, relationship_type?, max_depth?): breadth-first expansion\n\
         - get_entity / delete_entity: deleting an entity removes its edges",
    ),
    (
        "documents",
        "Knowledge-base documents for retrieval-augmented generation.\n\
         - kb_save_document(file_path, content, metadata?): large documents are\n\
           chunked into overlapping windows stored as <path>#chunk<i>\n\
         - kb_search_documents(query, limit?): cosine-ranked over all chunks\n\
         - kb_get_document(file_path) / kb_delete_document(file_path)",
    ),
    (
        "events",
        "Temporal events with hybrid retrieval.\n\
         - save_event(user_id, subject, content, metadata?): subject follows the\n\
           category:identifier convention, e.g. log:build\n\
         - search_events(user_id, query?, subject?, from_date?, to_date?,\n\
           last_hours?, last_days?, last_months?, limit?):\n\
           with a query the ranking blends BM25 and cosine; without one the\n\
           newest events come back first. Absolute dates beat relative windows.",
    ),
    (
        "code",
        "Per-project code-symbol indexes.\n\
         - index_code_project(path, name?): async; returns a job_id\n\
         - get_code_project_status(job_id | project_id): live progress\n\
         - search_code_symbols(project_id, query, symbol_types?, limit?)\n\
         - find_symbols_by_name(project_id, name) / find_symbols_by_file(project_id, file_path)\n\
         - reindex_code_project / delete_code_project / list_code_projects",
    ),
    (
        "watcher",
        "Incremental reindexing via a filesystem watcher.\n\
         - activate_project(project_id): watch one project; any previously\n\
           watched project is deactivated first (at most one is ever active)\n\
         - deactivate_project(project_id) / get_project_watch_status(project_id)\n\
         Changed files are reindexed after a short quiet period; deleted files\n\
         leave the index immediately. The active project resumes on restart.",
    ),
];

const OVERVIEW: &str = "engram is a long-term memory server. Memory layers:\n\
     facts (key-value), vectors (semantic recall), graph (entities and\n\
     relationships), documents (chunked knowledge base), events (temporal,\n\
     hybrid-searchable) and code (per-project symbol indexes with a file\n\
     watcher). Ask how_to_use with a topic for details.";

pub fn how_to_use(params: &HowToUseParams) -> Result<CallToolResult, McpError> {
    match params.topic.as_deref() {
        None => yaml_result(&serde_json::json!({
            "overview": OVERVIEW,
            "topics": TOPICS.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        })),
        Some(topic) => {
            let found = TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(topic));
            match found {
                Some((name, text)) => yaml_result(&serde_json::json!({
                    "topic": name,
                    "documentation": text,
                })),
                None => Err(McpError::invalid_params(
                    format!(
                        "unknown topic '{topic}'; known topics: {}",
                        TOPICS
                            .iter()
                            .map(|(name, _)| *name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    None,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_resolves() {
        for (name, _) in TOPICS {
            let params = HowToUseParams {
                topic: Some((*name).to_string()),
            };
            assert!(how_to_use(&params).is_ok(), "topic {name} failed");
        }
    }

    #[test]
    fn unknown_topic_is_an_input_error() {
        let params = HowToUseParams {
            topic: Some("quantum".to_string()),
        };
        assert!(how_to_use(&params).is_err());
    }

    #[test]
    fn no_topic_returns_the_overview() {
        assert!(how_to_use(&HowToUseParams::default()).is_ok());
    }
}
