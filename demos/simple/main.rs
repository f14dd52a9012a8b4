use std::{sync::Arc, time::Duration};

use izanami_resolver::{
    CallbackRegistry, CallbackRequest, EvaluationContext, EvaluatorConfig, FlagConfigStore,
    FlagDeclarations, FlagProvider, InMemoryTransport, QueryOptions, RawResult,
};
use serde_json::json;

const FLAGS: &str = r#"{
  "flags": [
    {"id": "turbo-mode", "valueType": "BOOLEAN", "defaultValue": false},
    {"id": "discount-rate", "valueType": "DOUBLE", "defaultValue": 0.0},
    {"id": "banner", "valueType": "OBJECT", "errorStrategy": "CALLBACK", "callback": "banner"}
  ]
}"#;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let mut callbacks = CallbackRegistry::new();
    callbacks.register("banner", |request: CallbackRequest| {
        json!({"text": format!("offline ({})", request.error)})
    });
    let store = FlagConfigStore::from_declarations(
        FlagDeclarations::from_json(FLAGS).unwrap(),
        &callbacks,
    )
    .unwrap();

    // Stands in for the remote source. discount-rate and banner have no result, as if the remote
    // source could not answer for them.
    let transport = Arc::new(InMemoryTransport::new());
    transport.set_result("turbo-mode", RawResult::Success(json!(true)));

    let mut config = EvaluatorConfig::new(Arc::new(store), transport);
    config.default_timeout(Duration::from_secs(1));
    let evaluator = config.to_evaluator();

    evaluator
        .wait_until_ready(Duration::from_secs(5))
        .await
        .unwrap();

    let options = QueryOptions::new().with_user("test-subject");
    let turbo = evaluator
        .boolean_details("turbo-mode", &options)
        .await
        .unwrap();
    println!(
        "turbo-mode: {:?} ({:?}, {:?})",
        turbo.value,
        turbo.value_source(),
        turbo.evaluation_reason()
    );

    let batch = evaluator
        .evaluate_batch(&["discount-rate", "banner", "unknown"], &options)
        .await;
    let discount = batch.double_details("discount-rate").await.unwrap();
    println!("discount-rate: {}", serde_json::to_string(&discount).unwrap());
    let banner = batch.object_details("banner").await.unwrap();
    println!("banner: {}", serde_json::to_string(&banner).unwrap());
    let unknown = batch.boolean_details("unknown").await.unwrap();
    println!("unknown: {}", serde_json::to_string(&unknown).unwrap());

    let provider = FlagProvider::new(evaluator);
    let evaluation = provider
        .resolve_float_value(
            "discount-rate",
            0.1,
            &EvaluationContext::new().with_targeting_key("test-subject"),
        )
        .await
        .unwrap();
    println!(
        "{} discount-rate: {} {:?}",
        provider.metadata().name,
        evaluation.value,
        evaluation.flag_metadata()
    );
}
