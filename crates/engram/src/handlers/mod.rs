//! MCP endpoint handlers
//!
//! One module per tool group; the router below exposes them all over the
//! agent tool protocol. Handlers take the shared [`AppState`] and return
//! YAML-encoded results.

pub mod common;
pub mod docs;
pub mod events;
pub mod facts;
pub mod graph;
pub mod projects;
pub mod symbols;
pub mod vectors;
pub mod documents;

// Internal dependencies
use crate::state::AppState;

// External dependencies
use agenterra_rmcp::handler::server::tool::Parameters;
use agenterra_rmcp::{
    Error as McpError, ServerHandler,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
        ToolsCapability,
    },
    tool,
};

#[derive(Clone)]
pub struct McpServer {
    tool_router: agenterra_rmcp::handler::server::router::tool::ToolRouter<McpServer>,
    state: AppState,
}

impl McpServer {
    /// Create a new MCP server instance over the shared application state
    pub fn new(state: AppState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }
}

#[agenterra_rmcp::tool_router]
impl McpServer {
    /// Returns MCP server status for Inspector/health validation
    #[tool(description = "Returns MCP server status for Inspector/health validation")]
    pub async fn ping(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            "The MCP server is alive!",
        )]))
    }

    // === Facts ===

    #[tool(description = "Save a fact (key-value) for a user or project scope. Overwrites an existing value. Values may be strings, numbers, booleans, objects or arrays.")]
    pub async fn save_fact(
        &self,
        Parameters(params): Parameters<facts::SaveFactParams>,
    ) -> Result<CallToolResult, McpError> {
        facts::save_fact(&self.state, params).await
    }

    #[tool(description = "Read one fact by scope and key. Returns null plus an alternatives list of known scopes when nothing matches.")]
    pub async fn get_fact(
        &self,
        Parameters(params): Parameters<facts::FactKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        facts::get_fact(&self.state, params).await
    }

    #[tool(description = "Update an existing fact. Fails when the fact does not exist; use save_fact to create-or-overwrite.")]
    pub async fn update_fact(
        &self,
        Parameters(params): Parameters<facts::SaveFactParams>,
    ) -> Result<CallToolResult, McpError> {
        facts::update_fact(&self.state, params).await
    }

    #[tool(description = "Delete one fact by scope and key.")]
    pub async fn delete_fact(
        &self,
        Parameters(params): Parameters<facts::FactKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        facts::delete_fact(&self.state, params).await
    }

    #[tool(description = "List every fact stored for one scope, as a key-to-value map.")]
    pub async fn list_facts(
        &self,
        Parameters(params): Parameters<facts::ListFactsParams>,
    ) -> Result<CallToolResult, McpError> {
        facts::list_facts(&self.state, params).await
    }

    // === Vector memories ===

    #[tool(description = "Store a vector memory: arbitrary text embedded server-side for later semantic recall. Returns the new memory id.")]
    pub async fn index_vector(
        &self,
        Parameters(params): Parameters<vectors::IndexVectorParams>,
    ) -> Result<CallToolResult, McpError> {
        vectors::index_vector(&self.state, params).await
    }

    #[tool(description = "Semantic search over vector memories by meaning, not keywords. Scoped to one user; empty scopes report known alternatives.")]
    pub async fn search_vectors(
        &self,
        Parameters(params): Parameters<vectors::SearchVectorsParams>,
    ) -> Result<CallToolResult, McpError> {
        vectors::search_vectors(&self.state, params).await
    }

    #[tool(description = "Update a vector memory's content and/or metadata. New content is re-embedded.")]
    pub async fn update_vector(
        &self,
        Parameters(params): Parameters<vectors::UpdateVectorParams>,
    ) -> Result<CallToolResult, McpError> {
        vectors::update_vector(&self.state, params).await
    }

    #[tool(description = "Delete a vector memory by id.")]
    pub async fn delete_vector(
        &self,
        Parameters(params): Parameters<vectors::DeleteVectorParams>,
    ) -> Result<CallToolResult, McpError> {
        vectors::delete_vector(&self.state, params).await
    }

    // === Graph memories ===

    #[tool(description = "Create a typed graph entity. The name doubles as an alternate lookup key for relationships and traversal.")]
    pub async fn create_entity(
        &self,
        Parameters(params): Parameters<graph::CreateEntityParams>,
    ) -> Result<CallToolResult, McpError> {
        graph::create_entity(&self.state, params).await
    }

    #[tool(description = "Create a typed relationship between two entities. Endpoints may be record ids or entity names; unresolved endpoints fail the call.")]
    pub async fn create_relationship(
        &self,
        Parameters(params): Parameters<graph::CreateRelationshipParams>,
    ) -> Result<CallToolResult, McpError> {
        graph::create_relationship(&self.state, params).await
    }

    #[tool(description = "Walk the graph outward from a start entity, breadth-first, optionally following only one relationship type.")]
    pub async fn traverse_graph(
        &self,
        Parameters(params): Parameters<graph::TraverseGraphParams>,
    ) -> Result<CallToolResult, McpError> {
        graph::traverse_graph(&self.state, params).await
    }

    #[tool(description = "Read one entity by record id or name. Unknown entities report known names as alternatives.")]
    pub async fn get_entity(
        &self,
        Parameters(params): Parameters<graph::EntityRefParams>,
    ) -> Result<CallToolResult, McpError> {
        graph::get_entity(&self.state, params).await
    }

    #[tool(description = "Delete an entity and every relationship touching it.")]
    pub async fn delete_entity(
        &self,
        Parameters(params): Parameters<graph::EntityRefParams>,
    ) -> Result<CallToolResult, McpError> {
        graph::delete_entity(&self.state, params).await
    }

    // === Knowledge base ===

    #[tool(description = "Save a knowledge-base document (Markdown or plain text). Large documents are chunked into overlapping embedded windows automatically.")]
    pub async fn kb_save_document(
        &self,
        Parameters(params): Parameters<documents::SaveDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        documents::save_document(&self.state, params).await
    }

    #[tool(description = "Semantic search over knowledge-base documents and chunks.")]
    pub async fn kb_search_documents(
        &self,
        Parameters(params): Parameters<documents::SearchDocumentsParams>,
    ) -> Result<CallToolResult, McpError> {
        documents::search_documents(&self.state, params).await
    }

    #[tool(description = "Delete a knowledge-base document and any chunks derived from it.")]
    pub async fn kb_delete_document(
        &self,
        Parameters(params): Parameters<documents::DocumentPathParams>,
    ) -> Result<CallToolResult, McpError> {
        documents::delete_document(&self.state, params).await
    }

    #[tool(description = "Read one knowledge-base document by path. Unknown paths report stored paths as alternatives.")]
    pub async fn kb_get_document(
        &self,
        Parameters(params): Parameters<documents::DocumentPathParams>,
    ) -> Result<CallToolResult, McpError> {
        documents::get_document(&self.state, params).await
    }

    // === Events ===

    #[tool(description = "Append a temporal event under a category:identifier subject. Content is embedded for hybrid retrieval.")]
    pub async fn save_event(
        &self,
        Parameters(params): Parameters<events::SaveEventParams>,
    ) -> Result<CallToolResult, McpError> {
        events::save_event(&self.state, params).await
    }

    #[tool(description = "Search events with hybrid BM25+semantic ranking, optional subject filter and absolute or relative time windows. Without a query, newest events come first.")]
    pub async fn search_events(
        &self,
        Parameters(params): Parameters<events::SearchEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        events::search_events(&self.state, params).await
    }

    // === Code projects ===

    #[tool(description = "Index a code project: scan, parse, extract symbols, embed and persist. Asynchronous; returns a job id to poll with get_code_project_status.")]
    pub async fn index_code_project(
        &self,
        Parameters(params): Parameters<projects::IndexProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::index_code_project(&self.state, params).await
    }

    #[tool(description = "Check an indexing job (by job_id) or a project's stored state and live progress (by project_id).")]
    pub async fn get_code_project_status(
        &self,
        Parameters(params): Parameters<projects::ProjectStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::get_code_project_status(&self.state, params).await
    }

    #[tool(description = "List every indexed code project with its status and watcher flag.")]
    pub async fn list_code_projects(
        &self,
        Parameters(params): Parameters<projects::ListProjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::list_code_projects(&self.state, params).await
    }

    #[tool(description = "Delete a code project and all of its files, symbols and chunks. Stops its watcher first when active.")]
    pub async fn delete_code_project(
        &self,
        Parameters(params): Parameters<projects::ProjectIdParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::delete_code_project(&self.state, params).await
    }

    #[tool(description = "Re-submit an indexing job for a known project using its stored root path. Unchanged files are skipped by hash.")]
    pub async fn reindex_code_project(
        &self,
        Parameters(params): Parameters<projects::ProjectIdParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::reindex_code_project(&self.state, params).await
    }

    #[tool(description = "Start watching a project for file changes. At most one project is watched at a time; activating another hands the watcher over.")]
    pub async fn activate_project(
        &self,
        Parameters(params): Parameters<projects::ProjectIdParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::activate_project(&self.state, params).await
    }

    #[tool(description = "Stop watching a project and clear its persistent watcher flag.")]
    pub async fn deactivate_project(
        &self,
        Parameters(params): Parameters<projects::ProjectIdParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::deactivate_project(&self.state, params).await
    }

    #[tool(description = "Report whether a project's watcher is active right now and whether its persistent flag is set.")]
    pub async fn get_project_watch_status(
        &self,
        Parameters(params): Parameters<projects::ProjectIdParams>,
    ) -> Result<CallToolResult, McpError> {
        projects::get_project_watch_status(&self.state, params).await
    }

    // === Code symbols ===

    #[tool(description = "Semantic search over a project's code symbols, optionally restricted to symbol types such as function or struct.")]
    pub async fn search_code_symbols(
        &self,
        Parameters(params): Parameters<symbols::SearchSymbolsParams>,
    ) -> Result<CallToolResult, McpError> {
        symbols::search_code_symbols(&self.state, params).await
    }

    #[tool(description = "Find symbols by exact name or prefix within a project.")]
    pub async fn find_symbols_by_name(
        &self,
        Parameters(params): Parameters<symbols::FindByNameParams>,
    ) -> Result<CallToolResult, McpError> {
        symbols::find_symbols_by_name(&self.state, params).await
    }

    #[tool(description = "List every symbol extracted from one file, in source order.")]
    pub async fn find_symbols_by_file(
        &self,
        Parameters(params): Parameters<symbols::FindByFileParams>,
    ) -> Result<CallToolResult, McpError> {
        symbols::find_symbols_by_file(&self.state, params).await
    }

    // === Documentation ===

    #[tool(description = "Usage documentation for this server. Pass a topic (facts, vectors, graph, documents, events, code, watcher) or nothing for the overview.")]
    pub async fn how_to_use(
        &self,
        Parameters(params): Parameters<docs::HowToUseParams>,
    ) -> Result<CallToolResult, McpError> {
        docs::how_to_use(&params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenterra_rmcp::model::RawContent;

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn fact_tools_round_trip_through_yaml() {
        let server = McpServer::new(crate::state::AppState::for_tests().await);

        server
            .save_fact(Parameters(facts::SaveFactParams {
                user_id: "proj1".into(),
                key: "lang".into(),
                value: serde_json::json!("go"),
            }))
            .await
            .expect("save");

        let listed = server
            .list_facts(Parameters(facts::ListFactsParams {
                user_id: "proj1".into(),
            }))
            .await
            .expect("list");
        let yaml = text_of(&listed);
        assert!(yaml.contains("lang"), "{yaml}");
        assert!(yaml.contains("go"), "{yaml}");

        server
            .update_fact(Parameters(facts::SaveFactParams {
                user_id: "proj1".into(),
                key: "lang".into(),
                value: serde_json::json!("rust"),
            }))
            .await
            .expect("update");
        let fetched = server
            .get_fact(Parameters(facts::FactKeyParams {
                user_id: "proj1".into(),
                key: "lang".into(),
            }))
            .await
            .expect("get");
        assert!(text_of(&fetched).contains("rust"));

        server
            .delete_fact(Parameters(facts::FactKeyParams {
                user_id: "proj1".into(),
                key: "lang".into(),
            }))
            .await
            .expect("delete");
        let gone = server
            .get_fact(Parameters(facts::FactKeyParams {
                user_id: "proj1".into(),
                key: "lang".into(),
            }))
            .await
            .expect("get after delete");
        assert!(text_of(&gone).contains("value: null"));
    }

    #[tokio::test]
    async fn update_fact_on_missing_key_is_invalid_params() {
        let server = McpServer::new(crate::state::AppState::for_tests().await);
        let err = server
            .update_fact(Parameters(facts::SaveFactParams {
                user_id: "u".into(),
                key: "missing".into(),
                value: serde_json::json!(1),
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not found"));
    }

    #[tokio::test]
    async fn graph_tools_resolve_names() {
        let server = McpServer::new(crate::state::AppState::for_tests().await);

        server
            .create_entity(Parameters(graph::CreateEntityParams {
                entity_type: "person".into(),
                name: "ada".into(),
                properties: None,
            }))
            .await
            .expect("entity a");
        server
            .create_entity(Parameters(graph::CreateEntityParams {
                entity_type: "person".into(),
                name: "charles".into(),
                properties: None,
            }))
            .await
            .expect("entity b");
        server
            .create_relationship(Parameters(graph::CreateRelationshipParams {
                from_entity: "ada".into(),
                to_entity: "charles".into(),
                relationship_type: "knows".into(),
                properties: None,
            }))
            .await
            .expect("edge");

        let traversal = server
            .traverse_graph(Parameters(graph::TraverseGraphParams {
                start: "ada".into(),
                relationship_type: None,
                max_depth: Some(1),
            }))
            .await
            .expect("traverse");
        assert!(text_of(&traversal).contains("charles"));
    }

    #[tokio::test]
    async fn event_tools_cover_the_hybrid_path() {
        let server = McpServer::new(crate::state::AppState::for_tests().await);

        for (subject, content) in [
            ("log:build", "build ok"),
            ("log:build", "build failed: database connection"),
            ("conversation:c1", "user said hello"),
        ] {
            server
                .save_event(Parameters(events::SaveEventParams {
                    user_id: "p1".into(),
                    subject: subject.into(),
                    content: content.into(),
                    metadata: None,
                }))
                .await
                .expect("save event");
        }

        let found = server
            .search_events(Parameters(events::SearchEventsParams {
                user_id: "p1".into(),
                query: Some("database".into()),
                subject: None,
                from_date: None,
                to_date: None,
                last_hours: None,
                last_days: Some(7),
                last_months: None,
                limit: None,
            }))
            .await
            .expect("search");
        let yaml = text_of(&found);
        assert!(yaml.contains("database connection"), "{yaml}");
        assert!(!yaml.contains("user said hello"), "{yaml}");
    }

    #[tokio::test]
    async fn document_tools_chunk_large_content() {
        let server = McpServer::new(crate::state::AppState::for_tests().await);

        let body = "memory systems and retrieval pipelines. ".repeat(300);
        server
            .kb_save_document(Parameters(documents::SaveDocumentParams {
                file_path: "guide.md".into(),
                content: body,
                metadata: None,
            }))
            .await
            .expect("save");

        let fetched = server
            .kb_get_document(Parameters(documents::DocumentPathParams {
                file_path: "guide.md#chunk0".into(),
            }))
            .await
            .expect("get chunk");
        assert!(text_of(&fetched).contains("source_file"));

        let missing = server
            .kb_get_document(Parameters(documents::DocumentPathParams {
                file_path: "nope.md".into(),
            }))
            .await
            .expect("get missing");
        assert!(text_of(&missing).contains("alternatives"));
    }
}

#[agenterra_rmcp::tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        let tools_capability = ToolsCapability {
            list_changed: Some(true),
        };

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                experimental: None,
                logging: None,
                completions: None,
                prompts: None,
                resources: None,
                tools: Some(tools_capability),
            },
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Long-term memory for AI agents: facts, vector memories, graph \
                 memories, knowledge-base documents, temporal events and \
                 per-project code-symbol indexes. Start with how_to_use."
                    .to_string(),
            ),
        }
    }
}
