use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use descramble::{
    AdvancedDeobfuscator, AdvancedOutcome, AdvancedRequest, AstOptimizer, ChatMessage,
    ChatOptions, ChatResponse, DeobfuscateOptions, Deobfuscator, DeobfuscatorConfig, LlmClient,
    ObfuscationType,
};

struct CannedLlm(&'static str);

impl LlmClient for CannedLlm {
    fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse> {
        Ok(ChatResponse { content: self.0.to_string() })
    }
}

#[derive(Default)]
struct CountingOptimizer {
    calls: AtomicUsize,
}

impl AstOptimizer for CountingOptimizer {
    fn optimize(&self, code: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(code.to_string())
    }
}

struct FailingAdvanced;

impl AdvancedDeobfuscator for FailingAdvanced {
    fn deobfuscate(&self, _request: &AdvancedRequest) -> Result<AdvancedOutcome> {
        anyhow::bail!("advanced backend offline")
    }
}

#[test]
fn clean_input_stays_unknown_and_unchanged() {
    let mut pipeline = Deobfuscator::default();
    let code = "function greet(name) { return 'hi ' + name; }";
    let result = pipeline.deobfuscate(&DeobfuscateOptions::for_code(code)).unwrap();
    assert_eq!(result.obfuscation_type, vec![ObfuscationType::Unknown]);
    assert!(result.code.contains("return 'hi ' + name"));
    assert!(result.warnings.is_empty());
}

#[test]
fn packer_input_unpacks_and_merges_the_tag() {
    let mut pipeline = Deobfuscator::default();
    let packed =
        "eval(function(p,a,c,k,e,d){return p}('0 1',62,2,'hello|world'.split('|'),0,{}))";
    let result = pipeline.deobfuscate(&DeobfuscateOptions::for_code(packed)).unwrap();
    assert!(result.code.contains("hello world"));
    assert!(result.obfuscation_type.contains(&ObfuscationType::Packer));
    assert!(!result.obfuscation_type.contains(&ObfuscationType::Unknown));
    let unpack = result.transformations.iter().find(|t| t.kind == "unpack").unwrap();
    assert!(unpack.success);
}

#[test]
fn string_array_access_is_decrypted() {
    let mut pipeline = Deobfuscator::default();
    let code = r#"var _0xabc = ["a", "b"]; console.log(_0xabc[1]);"#;
    let result = pipeline.deobfuscate(&DeobfuscateOptions::for_code(code)).unwrap();
    assert!(result.code.contains(r#"console.log("b")"#), "got: {}", result.code);
}

#[test]
fn aggressive_mode_unflattens_dispatcher_loops() {
    let mut pipeline = Deobfuscator::default();
    let code = r#"
        var order = "0|2|1".split('|'), i = 0;
        while (true) {
            switch (order[i++]) {
                case "0": first(); continue;
                case "1": third(); continue;
                case "2": second(); continue;
            }
            break;
        }
    "#;
    let options = DeobfuscateOptions { aggressive: true, ..DeobfuscateOptions::for_code(code) };
    let result = pipeline.deobfuscate(&options).unwrap();
    let first = result.code.find("first()").unwrap();
    let second = result.code.find("second()").unwrap();
    let third = result.code.find("third()").unwrap();
    assert!(first < second && second < third, "got: {}", result.code);
    assert!(!result.code.contains("switch"));
}

#[test]
fn unparseable_input_fails_stages_but_not_the_call() {
    let mut pipeline = Deobfuscator::default();
    let code = "function ( { this is not javascript";
    let result = pipeline.deobfuscate(&DeobfuscateOptions::for_code(code)).unwrap();
    assert_eq!(result.code, code, "broken input must pass through unchanged");
    assert!(result.transformations.iter().any(|t| !t.success));
}

#[test]
fn identical_calls_hit_the_cache() {
    let optimizer = Arc::new(CountingOptimizer::default());
    let config =
        DeobfuscatorConfig { ast_optimizer: Some(optimizer.clone()), ..Default::default() };
    let mut pipeline = Deobfuscator::new(config);
    let options = DeobfuscateOptions {
        ast_optimize: Some(true),
        ..DeobfuscateOptions::for_code("var cached = 1;")
    };
    let first = pipeline.deobfuscate(&options).unwrap();
    let second = pipeline.deobfuscate(&options).unwrap();
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 1, "second call must come from cache");
    assert_eq!(first.code, second.code);
}

#[test]
fn cache_evicts_the_oldest_insertion_after_capacity() {
    let optimizer = Arc::new(CountingOptimizer::default());
    let config =
        DeobfuscatorConfig { ast_optimizer: Some(optimizer.clone()), ..Default::default() };
    let mut pipeline = Deobfuscator::new(config);
    let first = DeobfuscateOptions {
        ast_optimize: Some(true),
        ..DeobfuscateOptions::for_code("var first = 0;")
    };
    pipeline.deobfuscate(&first).unwrap();
    for i in 0..100 {
        let options = DeobfuscateOptions {
            ast_optimize: Some(true),
            ..DeobfuscateOptions::for_code(format!("var filler{i} = {i};"))
        };
        pipeline.deobfuscate(&options).unwrap();
    }
    // 101 inserts happened; the first key must be gone again.
    let calls_before = optimizer.calls.load(Ordering::SeqCst);
    pipeline.deobfuscate(&first).unwrap();
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), calls_before + 1);
}

#[test]
fn clear_cache_forces_a_rerun() {
    let optimizer = Arc::new(CountingOptimizer::default());
    let config =
        DeobfuscatorConfig { ast_optimizer: Some(optimizer.clone()), ..Default::default() };
    let mut pipeline = Deobfuscator::new(config);
    let options = DeobfuscateOptions {
        ast_optimize: Some(true),
        ..DeobfuscateOptions::for_code("var once = 1;")
    };
    pipeline.deobfuscate(&options).unwrap();
    pipeline.clear_cache();
    pipeline.deobfuscate(&options).unwrap();
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_advanced_collaborator_degrades_to_warning() {
    let config = DeobfuscatorConfig {
        advanced: Some(Arc::new(FailingAdvanced)),
        ..Default::default()
    };
    let mut pipeline = Deobfuscator::new(config);
    let options = DeobfuscateOptions {
        advanced: Some(true),
        ..DeobfuscateOptions::for_code("var keep = 1;")
    };
    let result = pipeline.deobfuscate(&options).unwrap();
    assert!(result.code.contains("keep"));
    assert!(result.warnings.iter().any(|w| w.contains("advanced")));
    let advanced = result.transformations.iter().find(|t| t.kind == "advanced").unwrap();
    assert!(!advanced.success);
}

#[test]
fn llm_summary_lands_in_analysis() {
    let config = DeobfuscatorConfig {
        llm: Some(Arc::new(CannedLlm("Logs a constant to the console."))),
        ..Default::default()
    };
    let mut pipeline = Deobfuscator::new(config);
    let result =
        pipeline.deobfuscate(&DeobfuscateOptions::for_code("console.log(1);")).unwrap();
    assert_eq!(result.analysis.as_deref(), Some("Logs a constant to the console."));
}

#[test]
fn string_array_table_persists_across_calls() {
    // Arrays extracted by one call stay visible to later calls on the same
    // instance until clear_cache(); batching unrelated inputs through one
    // instance shares this state.
    let mut pipeline = Deobfuscator::default();
    pipeline
        .deobfuscate(&DeobfuscateOptions::for_code(r#"var _0xshared = ["kept"];"#))
        .unwrap();
    let result =
        pipeline.deobfuscate(&DeobfuscateOptions::for_code("use(_0xshared[0]);")).unwrap();
    assert!(result.code.contains(r#"use("kept")"#), "got: {}", result.code);
    assert!(result.warnings.iter().any(|w| w.contains("no interpreter loop")));
}

#[test]
fn empty_input_is_the_only_hard_error() {
    let mut pipeline = Deobfuscator::default();
    assert!(pipeline.deobfuscate(&DeobfuscateOptions::for_code("  ")).is_err());
}

#[test]
fn explicit_false_disables_a_triggered_stage() {
    let mut pipeline = Deobfuscator::default();
    let packed =
        "eval(function(p,a,c,k,e,d){return p}('0 1',62,2,'hello|world'.split('|'),0,{}))";
    let options = DeobfuscateOptions {
        unpack: Some(false),
        ..DeobfuscateOptions::for_code(packed)
    };
    let result = pipeline.deobfuscate(&options).unwrap();
    assert!(result.transformations.iter().all(|t| t.kind != "unpack"));
}

#[test]
fn result_serializes_to_json() {
    let mut pipeline = Deobfuscator::default();
    let result =
        pipeline.deobfuscate(&DeobfuscateOptions::for_code("var a = 1;")).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"readability_score\""));
    assert!(json.contains("\"transformations\""));
}
