pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::state::AppState;
use crate::taxonomy::handlers as taxonomy;
use crate::versioning::handlers as catalog;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Versioned catalog: prompt-templates, schema-templates,
        // system-instructions, model-configs
        .route("/api/v1/catalog/:family", post(catalog::handle_create))
        .route("/api/v1/catalog/:family/:id", get(catalog::handle_get_by_id))
        .route(
            "/api/v1/catalog/:family/:id/activate",
            post(catalog::handle_activate),
        )
        .route(
            "/api/v1/catalog/:family/keys/:key/active",
            get(catalog::handle_get_active),
        )
        .route(
            "/api/v1/catalog/:family/keys/:key/versions",
            get(catalog::handle_list_versions),
        )
        .route(
            "/api/v1/catalog/:family/keys/:key/versions/:version",
            get(catalog::handle_get_version),
        )
        // Generation
        .route("/api/v1/generations", post(generation::handle_generate))
        .route("/api/v1/artifacts/:id", get(generation::handle_get_artifact))
        // Taxonomy
        .route("/api/v1/taxonomy/ingest", post(taxonomy::handle_ingest))
        .route("/api/v1/taxonomy/subtree", get(taxonomy::handle_subtree))
        .route(
            "/api/v1/documents/:id/taxonomy",
            get(taxonomy::handle_document_taxonomy),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::testing::{test_context, ScriptedGenerator, TestContext};

    async fn send(ctx: &TestContext, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        build_router(ctx.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = test_context(ScriptedGenerator::succeeding("ok"));
        let response = send(&ctx, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], json!("learnforge"));
    }

    #[tokio::test]
    async fn test_catalog_create_activate_and_read() {
        let ctx = test_context(ScriptedGenerator::succeeding("ok"));

        let first = send(
            &ctx,
            "POST",
            "/api/v1/catalog/prompt-templates",
            Some(json!({"key": "SUMMARY", "payload": "Summarize {{ title }}"})),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let first = json_body(first).await;
        assert_eq!(first["version"], json!(1));
        assert_eq!(first["is_active"], json!(true));

        let second = json_body(
            send(
                &ctx,
                "POST",
                "/api/v1/catalog/prompt-templates",
                Some(json!({"key": "SUMMARY", "payload": "Briefly summarize {{ title }}"})),
            )
            .await,
        )
        .await;
        assert_eq!(second["version"], json!(2));
        assert_eq!(second["is_active"], json!(false));

        let uri = format!(
            "/api/v1/catalog/prompt-templates/{}/activate",
            second["id"].as_str().unwrap()
        );
        assert_eq!(send(&ctx, "POST", &uri, None).await.status(), StatusCode::OK);

        let active = json_body(
            send(
                &ctx,
                "GET",
                "/api/v1/catalog/prompt-templates/keys/SUMMARY/active",
                None,
            )
            .await,
        )
        .await;
        assert_eq!(active["version"], json!(2));

        let versions = json_body(
            send(
                &ctx,
                "GET",
                "/api/v1/catalog/prompt-templates/keys/SUMMARY/versions",
                None,
            )
            .await,
        )
        .await;
        let active_flags: Vec<bool> = versions
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["is_active"].as_bool().unwrap())
            .collect();
        assert_eq!(active_flags, vec![false, true]);

        let pinned = send(
            &ctx,
            "GET",
            "/api/v1/catalog/prompt-templates/keys/SUMMARY/versions/1",
            None,
        )
        .await;
        assert_eq!(pinned.status(), StatusCode::OK);

        let by_id = format!(
            "/api/v1/catalog/prompt-templates/{}",
            first["id"].as_str().unwrap()
        );
        assert_eq!(json_body(send(&ctx, "GET", &by_id, None).await).await["version"], json!(1));
    }

    #[tokio::test]
    async fn test_catalog_errors() {
        let ctx = test_context(ScriptedGenerator::succeeding("ok"));

        let unknown_family = send(&ctx, "POST", "/api/v1/catalog/widgets", Some(json!({"key": "K", "payload": "x"}))).await;
        assert_eq!(unknown_family.status(), StatusCode::NOT_FOUND);

        let empty = send(
            &ctx,
            "POST",
            "/api/v1/catalog/system-instructions",
            Some(json!({"key": "  ", "payload": "x"})),
        )
        .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(empty).await["error"]["code"], json!("INVALID_ARGUMENT"));

        let uri = format!("/api/v1/catalog/model-configs/{}/activate", Uuid::new_v4());
        assert_eq!(send(&ctx, "POST", &uri, None).await.status(), StatusCode::NOT_FOUND);

        let missing = send(
            &ctx,
            "GET",
            "/api/v1/catalog/schema-templates/keys/NOPE/active",
            None,
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_then_ingest_from_artifact() {
        let output = json!({"proposed_taxonomy": [
            {"name": "Biology", "children": ["Genetics", "Ecology"]}
        ]})
        .to_string();
        let ctx = test_context(ScriptedGenerator::succeeding(&output));
        let model_id = crate::testing::seed_model_config(&ctx.versions, "claude-sonnet-4-5").await;
        let document_id = Uuid::new_v4();

        let generated = send(
            &ctx,
            "POST",
            "/api/v1/generations",
            Some(json!({
                "document_id": document_id,
                "instructions": {"inline": "Propose a taxonomy"},
                "output": {"format": "json", "inline_schema": {"type": "object"}},
                "model_config_id": model_id
            })),
        )
        .await;
        assert_eq!(generated.status(), StatusCode::OK);
        let generated = json_body(generated).await;
        let call = ctx.generator.last_call().unwrap();
        assert_eq!(call.prompt, "Propose a taxonomy");
        assert!(call.system_instruction.is_none());
        assert_eq!(call.model.name, "claude-sonnet-4-5");
        let artifact_id = generated["artifact_id"].as_str().unwrap().to_string();

        let artifact = send(&ctx, "GET", &format!("/api/v1/artifacts/{artifact_id}"), None).await;
        assert_eq!(json_body(artifact).await["status"], json!("READY"));

        let ingested = send(
            &ctx,
            "POST",
            "/api/v1/taxonomy/ingest",
            Some(json!({
                "document_id": document_id,
                "created_by": Uuid::new_v4(),
                "artifact_id": artifact_id
            })),
        )
        .await;
        assert_eq!(ingested.status(), StatusCode::CREATED);
        assert_eq!(json_body(ingested).await["nodes"].as_array().unwrap().len(), 3);

        let listed = json_body(
            send(&ctx, "GET", &format!("/api/v1/documents/{document_id}/taxonomy"), None).await,
        )
        .await;
        assert_eq!(listed.as_array().unwrap().len(), 3);

        let subtree = json_body(
            send(&ctx, "GET", "/api/v1/taxonomy/subtree?path=biology", None).await,
        )
        .await;
        let paths: Vec<&str> = subtree
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["biology", "biology/ecology", "biology/genetics"]);
    }

    #[tokio::test]
    async fn test_generator_failure_returns_500_and_records_error() {
        let ctx = test_context(ScriptedGenerator::failing("upstream unavailable"));
        let model_id = crate::testing::seed_model_config(&ctx.versions, "claude-sonnet-4-5").await;

        let response = send(
            &ctx,
            "POST",
            "/api/v1/generations",
            Some(json!({
                "instructions": {"inline": "Explain osmosis"},
                "model_config_id": model_id
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let artifacts = ctx.artifacts.all();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].status, "ERROR");
        assert_eq!(ctx.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_corrupted_and_ambiguous_input() {
        let ctx = test_context(ScriptedGenerator::succeeding("ok"));

        let corrupted = send(
            &ctx,
            "POST",
            "/api/v1/taxonomy/ingest",
            Some(json!({
                "document_id": Uuid::new_v4(),
                "created_by": Uuid::new_v4(),
                "raw_output": json!({"proposed_taxonomy": [
                    {"name": "Biology", "children": ["name", "description"]}
                ]}).to_string()
            })),
        )
        .await;
        assert_eq!(corrupted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(corrupted).await["error"]["code"],
            json!("CORRUPTED_TAXONOMY_INPUT")
        );
        assert!(ctx.taxonomy.all_nodes().is_empty());

        let neither = send(
            &ctx,
            "POST",
            "/api/v1/taxonomy/ingest",
            Some(json!({"document_id": Uuid::new_v4(), "created_by": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(neither.status(), StatusCode::BAD_REQUEST);

        let empty_path = send(&ctx, "GET", "/api/v1/taxonomy/subtree?path=/", None).await;
        assert_eq!(empty_path.status(), StatusCode::BAD_REQUEST);
    }
}
