//! Pipeline orchestration.
//!
//! Stage order is fixed: detect → unpack → jsvmp → advanced → array
//! extraction → folding → string decoding → array decryption → unflatten
//! (aggressive) → simplify → AST optimize → rename → AI summary. Every
//! stage is individually guarded: a failing stage appends an unsuccessful
//! transformation and the pipeline continues with the code it already has.
//! Only errors outside all stage boundaries propagate to the caller.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use descramble_core::cache::{cache_key, ResultCache};
use descramble_core::detect::detect_obfuscation;
use descramble_core::error::StageError;
use descramble_core::llm::{prompts, ChatOptions, LlmClient};
use descramble_core::model::{
    DeobfuscateResult, ObfuscationType, Transformation, UnresolvedPart,
};
use descramble_core::score::{blend_confidence, readability_score};
use descramble_core::timeout::Budget;
use descramble_passes as passes;
use descramble_passes::StringArrayTable;
use descramble_unpack::UniversalUnpacker;
use descramble_vm::{JsvmpDeobfuscator, VmOptions};

use crate::collab::{AdvancedDeobfuscator, AdvancedRequest, AstOptimizer};
use crate::options::DeobfuscateOptions;

const UNPACK_TRIGGERS: &[ObfuscationType] = &[
    ObfuscationType::Packer,
    ObfuscationType::AaEncode,
    ObfuscationType::UrlEncoded,
    ObfuscationType::EvalObfuscation,
];

const JSVMP_TRIGGERS: &[ObfuscationType] = &[
    ObfuscationType::VmProtection,
    ObfuscationType::ControlFlowFlattening,
    ObfuscationType::JavascriptObfuscator,
    ObfuscationType::JsFuck,
];

const ADVANCED_TRIGGERS: &[ObfuscationType] = &[
    ObfuscationType::JavascriptObfuscator,
    ObfuscationType::StringArrayRotation,
    ObfuscationType::DeadCodeInjection,
    ObfuscationType::OpaquePredicates,
];

const AST_OPTIMIZE_TRIGGERS: &[ObfuscationType] = &[
    ObfuscationType::ControlFlowFlattening,
    ObfuscationType::Uglify,
    ObfuscationType::JavascriptObfuscator,
];

/// Collaborators injected at construction time.
#[derive(Default, Clone)]
pub struct DeobfuscatorConfig {
    pub llm: Option<Arc<dyn LlmClient>>,
    pub advanced: Option<Arc<dyn AdvancedDeobfuscator>>,
    pub ast_optimizer: Option<Arc<dyn AstOptimizer>>,
}

/// The pipeline instance.
///
/// The result cache and the string-array table live on the instance and
/// persist across calls until [`Deobfuscator::clear_cache`]. Arrays
/// extracted by one call are therefore visible to later calls on the same
/// instance; callers batching unrelated inputs through one instance share
/// that state.
pub struct Deobfuscator {
    config: DeobfuscatorConfig,
    vm: JsvmpDeobfuscator,
    string_arrays: StringArrayTable,
    cache: ResultCache,
}

impl Default for Deobfuscator {
    fn default() -> Self {
        Self::new(DeobfuscatorConfig::default())
    }
}

impl Deobfuscator {
    pub fn new(config: DeobfuscatorConfig) -> Self {
        let vm = JsvmpDeobfuscator::new(config.llm.clone());
        Self { config, vm, string_arrays: StringArrayTable::new(), cache: ResultCache::new() }
    }

    /// Empties the result cache and the extracted string-array table.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.string_arrays.clear();
    }

    pub fn deobfuscate(&mut self, options: &DeobfuscateOptions) -> Result<DeobfuscateResult> {
        if options.code.trim().is_empty() {
            bail!("no code provided");
        }

        let key = cache_key(
            &options.code,
            &[
                ("aggressive", options.aggressive),
                ("advanced", options.advanced.unwrap_or(false)),
                ("jsvmp", options.jsvmp.unwrap_or(false)),
                ("ast_optimize", options.ast_optimize.unwrap_or(false)),
                ("unpack", options.unpack.unwrap_or(false)),
                ("auto", options.auto),
            ],
        );
        if let Some(hit) = self.cache.get(&key) {
            let prefix = &key[..12];
            debug!(key = %prefix, "result served from cache");
            return Ok(hit.clone());
        }

        let mut code = options.code.clone();
        let mut transformations: Vec<Transformation> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut unresolved: Vec<UnresolvedPart> = Vec::new();
        let mut analysis: Option<String> = None;

        // The detector runs exactly once; later stages refine the tag set.
        let mut detected = detect_obfuscation(&code);
        transformations.push(
            Transformation::succeeded("detect", "obfuscation techniques detected")
                .with_detail(join_tags(&detected)),
        );

        if should_run(options.unpack, options.auto, &detected, UNPACK_TRIGGERS) {
            let outcome = UniversalUnpacker::unpack(&code);
            warnings.extend(outcome.warnings);
            if outcome.success {
                code = outcome.code;
                if let Some(tag) = outcome.kind.obfuscation_type() {
                    detected.insert(tag);
                }
                transformations.push(Transformation::succeeded(
                    "unpack",
                    format!("{} payload unpacked", outcome.kind.as_str()),
                ));
            } else {
                transformations
                    .push(Transformation::failed("unpack", "no unpacker family matched"));
            }
        }

        if should_run(options.jsvmp, options.auto, &detected, JSVMP_TRIGGERS) {
            let vm_options = VmOptions {
                aggressive: options.aggressive_vm || options.aggressive,
                extract_instructions: true,
                budget: Budget::new(options.timeout_ms.map(Duration::from_millis)),
            };
            let report = self.vm.deobfuscate(&code, &vm_options);
            // Warnings and unresolved parts travel verbatim; downstream
            // consumers want the detail, not a summary.
            warnings.extend(report.warnings);
            unresolved.extend(report.unresolved_parts);
            if report.is_jsvmp && report.deobfuscated_code != code {
                code = report.deobfuscated_code;
                detected.insert(ObfuscationType::VmProtection);
                let vm_name =
                    report.vm_type.map(|t| t.as_str().to_string()).unwrap_or_default();
                transformations.push(
                    Transformation::succeeded("jsvmp", format!("{vm_name} vm restored"))
                        .with_detail(format!("confidence {:.2}", report.confidence)),
                );
            } else {
                transformations
                    .push(Transformation::failed("jsvmp", "no restorable vm structure"));
            }
        }

        if should_run(options.advanced, options.auto, &detected, ADVANCED_TRIGGERS) {
            match &self.config.advanced {
                Some(advanced) => {
                    let request =
                        AdvancedRequest { code: code.clone(), aggressive: options.aggressive };
                    match advanced.deobfuscate(&request) {
                        Ok(outcome) => {
                            warnings.extend(outcome.warnings);
                            code = outcome.code;
                            transformations.push(
                                Transformation::succeeded("advanced", "advanced pass applied")
                                    .with_detail(outcome.detected_techniques.join(", ")),
                            );
                        }
                        Err(err) => {
                            warn!(error = %err, "advanced deobfuscator failed");
                            warnings.push(format!("advanced stage failed: {err}"));
                            transformations
                                .push(Transformation::failed("advanced", "advanced pass failed"));
                        }
                    }
                }
                None => {
                    transformations.push(Transformation::failed(
                        "advanced",
                        "advanced deobfuscator not configured",
                    ));
                }
            }
        }

        match passes::extract_string_arrays(&code, &mut self.string_arrays) {
            Ok(count) => transformations.push(
                Transformation::succeeded("extract-arrays", "string arrays collected")
                    .with_detail(format!("{count} arrays, {} known", self.string_arrays.len())),
            ),
            Err(err) => record_failure(
                &mut transformations,
                "extract-arrays",
                "string array extraction",
                &err,
            ),
        }

        run_stage(&mut code, &mut transformations, "fold", "constants folded", |c| {
            passes::fold_constants(c)
        });
        run_stage(&mut code, &mut transformations, "decode-strings", "escapes decoded", |c| {
            passes::decode_string_literals(c)
        });
        let table = &self.string_arrays;
        run_stage(&mut code, &mut transformations, "decrypt-arrays", "array reads inlined", |c| {
            passes::decrypt_string_arrays(c, table)
        });

        if options.aggressive {
            run_stage(&mut code, &mut transformations, "unflatten", "control flow rebuilt", |c| {
                passes::unflatten_control_flow(c)
            });
        }

        run_stage(&mut code, &mut transformations, "simplify", "expressions simplified", |c| {
            passes::simplify_expressions(c)
        });

        if should_run(options.ast_optimize, options.auto, &detected, AST_OPTIMIZE_TRIGGERS) {
            match &self.config.ast_optimizer {
                Some(optimizer) => match optimizer.optimize(&code) {
                    Ok(optimized) => {
                        code = optimized;
                        transformations
                            .push(Transformation::succeeded("ast-optimize", "tree optimized"));
                    }
                    Err(err) => {
                        warn!(error = %err, "ast optimizer failed");
                        warnings.push(format!("ast optimizer failed: {err}"));
                        transformations
                            .push(Transformation::failed("ast-optimize", "optimizer failed"));
                    }
                },
                None => transformations
                    .push(Transformation::failed("ast-optimize", "optimizer not configured")),
            }
        }

        if options.rename_variables {
            run_stage(&mut code, &mut transformations, "rename", "identifiers renamed", |c| {
                passes::rename_variables(c)
            });
        }

        if options.auto {
            if let Some(llm) = &self.config.llm {
                match llm.chat(&prompts::summary(&code), &ChatOptions::default()) {
                    Ok(response) => {
                        analysis = Some(response.content);
                        transformations
                            .push(Transformation::succeeded("analyze", "summary produced"));
                    }
                    Err(err) => {
                        warn!(error = %err, "summary analysis failed");
                        warnings.push(format!("analysis stage failed: {err}"));
                        transformations
                            .push(Transformation::failed("analyze", "summary unavailable"));
                    }
                }
            }
        }

        // Unknown only survives when nothing concrete was ever tagged.
        if detected.len() > 1 {
            detected.remove(&ObfuscationType::Unknown);
        }

        let score = readability_score(&code);
        let confidence = blend_confidence(&transformations, score);
        let result = DeobfuscateResult {
            code,
            readability_score: score,
            confidence,
            obfuscation_type: detected.into_iter().collect(),
            transformations,
            analysis,
            warnings,
            unresolved_parts: unresolved,
        };
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

/// An explicit stage flag always wins; otherwise the stage runs when auto
/// mode is on and any detected tag is in the stage's trigger list.
fn should_run(
    explicit: Option<bool>,
    auto: bool,
    detected: &BTreeSet<ObfuscationType>,
    triggers: &[ObfuscationType],
) -> bool {
    match explicit {
        Some(flag) => flag,
        None => auto && triggers.iter().any(|tag| detected.contains(tag)),
    }
}

fn run_stage(
    code: &mut String,
    transformations: &mut Vec<Transformation>,
    kind: &str,
    description: &str,
    stage: impl FnOnce(&str) -> Result<String, StageError>,
) {
    match stage(code) {
        Ok(next) => {
            *code = next;
            transformations.push(Transformation::succeeded(kind, description));
        }
        Err(err) => record_failure(transformations, kind, description, &err),
    }
}

fn record_failure(
    transformations: &mut Vec<Transformation>,
    kind: &str,
    description: &str,
    err: &StageError,
) {
    warn!(stage = kind, error = %err, "stage failed, keeping previous code");
    transformations
        .push(Transformation::failed(kind, description).with_detail(err.to_string()));
}

fn join_tags(tags: &BTreeSet<ObfuscationType>) -> String {
    tags.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_beats_auto() {
        let detected: BTreeSet<ObfuscationType> =
            [ObfuscationType::Packer].into_iter().collect();
        assert!(!should_run(Some(false), true, &detected, UNPACK_TRIGGERS));
        assert!(should_run(Some(true), false, &BTreeSet::new(), UNPACK_TRIGGERS));
    }

    #[test]
    fn auto_requires_a_trigger_hit() {
        let packer: BTreeSet<ObfuscationType> = [ObfuscationType::Packer].into_iter().collect();
        let clean: BTreeSet<ObfuscationType> = [ObfuscationType::Unknown].into_iter().collect();
        assert!(should_run(None, true, &packer, UNPACK_TRIGGERS));
        assert!(!should_run(None, true, &clean, UNPACK_TRIGGERS));
        assert!(!should_run(None, false, &packer, UNPACK_TRIGGERS));
    }
}
